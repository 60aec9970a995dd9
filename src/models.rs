use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub type BranchId = u32;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub genres: Vec<String>,
    pub pages: u32,
    // one record per branch copy; the only availability representation
    #[serde(rename = "perpus")]
    pub copies: Vec<BranchCopy>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchCopy {
    #[serde(rename = "branchID")]
    pub branch_id: BranchId,
    pub available: bool,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub picture: Option<String>,
    pub created_at: NaiveDateTime,
    pub admin: bool,
    pub books_to_be_picked_up: Vec<ReservationEntry>,
    pub currently_borrowing: Vec<BorrowingEntry>,
    pub completed: Vec<ReservationEntry>,
    pub total_points: i64,
    pub points_history: Vec<PointsEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationEntry {
    #[serde(rename = "bookID")]
    pub book_id: String,
    #[serde(rename = "branchID")]
    pub branch_id: BranchId,
    pub pickup_date: NaiveDate,
    #[serde(rename = "reserveTime")]
    pub reserve_days: u32,
    pub book_point: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowingEntry {
    #[serde(flatten)]
    pub entry: ReservationEntry,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsEntry {
    #[serde(rename = "type")]
    pub kind: PointsKind,
    pub points: i64,
    pub activity: String,
    pub date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointsKind {
    Addition,
    Deduction,
}

impl PointsKind {
    pub fn signed(&self, points: i64) -> i64 {
        match self {
            PointsKind::Addition => points,
            PointsKind::Deduction => -points,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: String,
    pub title: String,
    pub cost: i64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BookChunk {
    pub items: Vec<Book>,
    pub total_count: u32,
}
