mod accounts;
mod branches;
mod catalog;
mod models;
mod notify;
mod reserve;
mod retry;
mod rewards;
mod store;

use actix_web::{
    get, post,
    web::{route, Data, Json, Path, Query},
    App, HttpResponse, HttpServer,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    env::var,
    net::{Ipv4Addr, SocketAddrV4},
    path::PathBuf,
    time::Duration,
};

use accounts::{Accounts, ProfileUpdate};
use branches::Branches;
use catalog::Catalog;
use chrono::{NaiveDate, Utc};
use models::{Branch, BranchId, BorrowingEntry, ReservationEntry, User};
use notify::DuePoller;
use reserve::{PickupOutcome, PointPolicy, Reservations, ReserveOutcome, ReturnOutcome};
use retry::RetryPolicy;
use rewards::{RedeemOutcome, Rewards};
use store::Store;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = var("PORT")
        .ok()
        .and_then(|text| text.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);

    let policy: PointPolicy = var("POINT_POLICY")
        .unwrap_or_else(|_| "fixed:50".to_string())
        .parse()?;
    let retry = RetryPolicy::new(
        var("RETRY_ATTEMPTS")
            .ok()
            .and_then(|text| text.parse().ok())
            .unwrap_or(3),
        Duration::from_millis(
            var("RETRY_DELAY_MS")
                .ok()
                .and_then(|text| text.parse().ok())
                .unwrap_or(1000),
        ),
        var("RETRY_MULTIPLIER")
            .ok()
            .and_then(|text| text.parse().ok())
            .unwrap_or(1),
    );

    let store = Store::new();
    if let Ok(path) = var("SEED_PATH") {
        store.load_seed(&PathBuf::from(path)).await?;
    }

    let poll_secs: u64 = var("DUE_POLL_SECS")
        .ok()
        .and_then(|text| text.parse().ok())
        .unwrap_or(1800);
    let _poller = DuePoller::spawn(store.clone(), Duration::from_secs(poll_secs), 1);

    let catalog = Catalog::new(store.clone());
    let branches = Branches::new(store.clone());
    let accounts = Accounts::new(store.clone(), retry);
    let reservations = Reservations::new(store.clone(), policy, retry);
    let rewards = Rewards::new(store.clone());

    tracing::info!(%addr, ?policy, "starting bookease api");

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(catalog.clone()))
            .app_data(Data::new(branches.clone()))
            .app_data(Data::new(accounts.clone()))
            .app_data(Data::new(reservations.clone()))
            .app_data(Data::new(rewards.clone()))
            .service(book_query)
            .service(books_by_genres)
            .service(book_get)
            .service(book_branches)
            .service(genre_list)
            .service(user_create)
            .service(user_login)
            .service(user_logout)
            .service(user_get)
            .service(profile_update)
            .service(users_all)
            .service(reserve_create)
            .service(reserve_pickup)
            .service(reserve_complete)
            .service(history)
            .service(reward_query)
            .service(reward_redeem)
            .service(ledger_get)
            .default_service(route().to(fallback))
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}

async fn session_user(accounts: &Accounts, token: &str) -> Option<User> {
    accounts.user_get(token).await.ok().flatten()
}

#[derive(Debug, Deserialize)]
struct BookQuery {
    filter: Option<String>,
    genres: Option<String>,
    page_size: u32,
    page: u32,
}

#[get("/")]
async fn book_query(query: Query<BookQuery>, catalog: Data<Catalog>) -> HttpResponse {
    let genres: Vec<String> = query
        .genres
        .as_deref()
        .unwrap_or("")
        .split(',')
        .filter(|genre| !genre.is_empty())
        .map(str::to_string)
        .collect();

    let Ok(result) = catalog
        .book_query(
            query.filter.as_deref().unwrap_or(""),
            &genres,
            query.page_size,
            query.page,
        )
        .await
    else {
        return HttpResponse::InternalServerError().body("failed to fetch data");
    };

    HttpResponse::Ok().json(result)
}

#[derive(Debug, Deserialize)]
struct GenreQuery {
    genres: String,
}

#[get("/books_by_genres")]
async fn books_by_genres(query: Query<GenreQuery>, catalog: Data<Catalog>) -> HttpResponse {
    let genres: Vec<String> = query
        .genres
        .split(',')
        .filter(|genre| !genre.is_empty())
        .map(str::to_string)
        .collect();

    let Ok(result) = catalog.books_by_genres(&genres).await else {
        return HttpResponse::InternalServerError().body("failed to fetch data");
    };

    HttpResponse::Ok().json(result)
}

#[get("/book/{id}")]
async fn book_get(id: Path<String>, catalog: Data<Catalog>) -> HttpResponse {
    let Ok(result) = catalog.book_get(id.as_str()).await else {
        return HttpResponse::InternalServerError().body("failed to fetch data");
    };
    match result {
        Some(book) => HttpResponse::Ok().json(book),
        None => HttpResponse::NotFound().body("no such book"),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityResponse {
    branch_ids: Vec<BranchId>,
    branches: Vec<Branch>,
}

#[get("/book/{id}/branches")]
async fn book_branches(
    id: Path<String>,
    branches: Data<Branches>,
) -> HttpResponse {
    let Ok(branch_ids) = branches.available_branches(id.as_str()).await else {
        return HttpResponse::InternalServerError().body("failed to fetch data");
    };
    let Ok(resolved) = branches.branches_get(&branch_ids).await else {
        return HttpResponse::InternalServerError().body("failed to fetch data");
    };

    HttpResponse::Ok().json(AvailabilityResponse {
        branch_ids,
        branches: resolved,
    })
}

#[get("/genres")]
async fn genre_list() -> HttpResponse {
    HttpResponse::Ok().json(&*catalog::GENRES)
}

#[derive(Debug, Deserialize)]
struct UserCreateData {
    email: String,
    password: String,
    name: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    address: String,
}

#[post("/user_create")]
async fn user_create(data: Json<UserCreateData>, accounts: Data<Accounts>) -> HttpResponse {
    let Ok(user) = accounts
        .user_create(
            data.email.as_str(),
            data.password.as_str(),
            data.name.as_str(),
            data.phone.as_str(),
            data.address.as_str(),
        )
        .await
    else {
        return HttpResponse::BadRequest().body("failed to create user");
    };

    HttpResponse::Ok().json(user)
}

#[derive(Debug, Deserialize)]
struct UserLoginData {
    email: String,
    password: String,
}

#[post("/user_login")]
async fn user_login(data: Json<UserLoginData>, accounts: Data<Accounts>) -> HttpResponse {
    let Ok(result) = accounts
        .user_login(data.email.as_str(), data.password.as_str())
        .await
    else {
        return HttpResponse::InternalServerError().body("failed to login");
    };
    match result {
        Some(token) => HttpResponse::Ok().json(token),
        None => HttpResponse::Unauthorized().body("failed to login"),
    }
}

#[derive(Debug, Deserialize)]
struct TokenData {
    token: String,
}

#[post("/user_logout")]
async fn user_logout(data: Json<TokenData>, accounts: Data<Accounts>) -> HttpResponse {
    let Ok(_) = accounts.user_logout(data.token.as_str()).await else {
        return HttpResponse::InternalServerError().body("failed to logout");
    };

    HttpResponse::Ok().body("success to logout")
}

#[post("/user_get")]
async fn user_get(data: Json<TokenData>, accounts: Data<Accounts>) -> HttpResponse {
    match session_user(&accounts, data.token.as_str()).await {
        Some(user) => HttpResponse::Ok().json(user),
        None => HttpResponse::Unauthorized().body("not logged in"),
    }
}

#[derive(Debug, Deserialize)]
struct ProfileUpdateData {
    token: String,
    name: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    picture: Option<String>,
}

#[post("/profile_update")]
async fn profile_update(data: Json<ProfileUpdateData>, accounts: Data<Accounts>) -> HttpResponse {
    let data = data.into_inner();
    let update = ProfileUpdate {
        name: data.name,
        phone: data.phone,
        address: data.address,
        picture: data.picture,
    };

    let Ok(result) = accounts.user_update_profile(data.token.as_str(), update).await else {
        return HttpResponse::BadRequest().body("failed to update profile");
    };
    match result {
        Some(user) => HttpResponse::Ok().json(user),
        None => HttpResponse::Unauthorized().body("not logged in"),
    }
}

#[post("/users")]
async fn users_all(data: Json<TokenData>, accounts: Data<Accounts>) -> HttpResponse {
    match session_user(&accounts, data.token.as_str()).await {
        Some(user) if user.admin => {}
        _ => return HttpResponse::Unauthorized().body("administrator only"),
    }

    let Ok(users) = accounts.users_all().await else {
        return HttpResponse::InternalServerError().body("failed to fetch data");
    };

    HttpResponse::Ok().json(users)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReserveCreateData {
    token: String,
    #[serde(rename = "bookID")]
    book_id: String,
    #[serde(rename = "branchID")]
    branch_id: BranchId,
    pickup_date: NaiveDate,
    #[serde(rename = "reserveTime")]
    reserve_days: u32,
}

#[post("/reserve_create")]
async fn reserve_create(
    data: Json<ReserveCreateData>,
    accounts: Data<Accounts>,
    reservations: Data<Reservations>,
) -> HttpResponse {
    let Some(user) = session_user(&accounts, data.token.as_str()).await else {
        return HttpResponse::Unauthorized().body("not logged in");
    };

    let Ok(outcome) = reservations
        .reserve(
            &user.id,
            data.book_id.as_str(),
            data.branch_id,
            data.pickup_date,
            data.reserve_days,
        )
        .await
    else {
        return HttpResponse::InternalServerError().body("failed to reserve");
    };

    match outcome {
        ReserveOutcome::Reserved(entry) => HttpResponse::Ok().json(entry),
        ReserveOutcome::Unavailable => {
            HttpResponse::BadRequest().body("no available copy at that branch")
        }
        ReserveOutcome::AlreadyHeld => {
            HttpResponse::BadRequest().body("book already held at that branch")
        }
        ReserveOutcome::InvalidDuration => {
            HttpResponse::BadRequest().body("loan duration must be between 1 and 7 days")
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransitionData {
    token: String,
    #[serde(rename = "userID")]
    user_id: String,
    #[serde(rename = "bookID")]
    book_id: String,
    #[serde(rename = "branchID")]
    branch_id: BranchId,
}

#[post("/reserve_pickup")]
async fn reserve_pickup(
    data: Json<TransitionData>,
    accounts: Data<Accounts>,
    reservations: Data<Reservations>,
) -> HttpResponse {
    match session_user(&accounts, data.token.as_str()).await {
        Some(user) if user.admin => {}
        _ => return HttpResponse::Unauthorized().body("administrator only"),
    }

    let Ok(outcome) = reservations
        .pickup(data.user_id.as_str(), data.book_id.as_str(), data.branch_id)
        .await
    else {
        return HttpResponse::BadRequest().body("failed to mark picked up");
    };

    match outcome {
        PickupOutcome::PickedUp { due_date } => HttpResponse::Ok().json(due_date),
        PickupOutcome::NotFound => HttpResponse::NotFound().body("no matching reservation"),
    }
}

#[post("/reserve_complete")]
async fn reserve_complete(
    data: Json<TransitionData>,
    accounts: Data<Accounts>,
    reservations: Data<Reservations>,
) -> HttpResponse {
    match session_user(&accounts, data.token.as_str()).await {
        Some(user) if user.admin => {}
        _ => return HttpResponse::Unauthorized().body("administrator only"),
    }

    let Ok(outcome) = reservations
        .complete(data.user_id.as_str(), data.book_id.as_str(), data.branch_id)
        .await
    else {
        return HttpResponse::BadRequest().body("failed to mark returned");
    };

    match outcome {
        ReturnOutcome::Completed { credited } => HttpResponse::Ok().json(credited),
        ReturnOutcome::NotFound => HttpResponse::NotFound().body("no matching borrowing"),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PickupItem {
    #[serde(flatten)]
    entry: ReservationEntry,
    expired: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    books_to_be_picked_up: Vec<PickupItem>,
    currently_borrowing: Vec<BorrowingEntry>,
    completed: Vec<ReservationEntry>,
}

#[post("/history")]
async fn history(data: Json<TokenData>, accounts: Data<Accounts>) -> HttpResponse {
    let Some(user) = session_user(&accounts, data.token.as_str()).await else {
        return HttpResponse::Unauthorized().body("not logged in");
    };

    let today = Utc::now().date_naive();
    let books_to_be_picked_up = user
        .books_to_be_picked_up
        .into_iter()
        .map(|entry| PickupItem {
            expired: reserve::is_expired(&entry, today),
            entry,
        })
        .collect();

    HttpResponse::Ok().json(HistoryResponse {
        books_to_be_picked_up,
        currently_borrowing: user.currently_borrowing,
        completed: user.completed,
    })
}

#[get("/rewards")]
async fn reward_query(rewards: Data<Rewards>) -> HttpResponse {
    let Ok(result) = rewards.rewards_all().await else {
        return HttpResponse::InternalServerError().body("failed to fetch data");
    };

    HttpResponse::Ok().json(result)
}

#[derive(Debug, Deserialize)]
struct RedeemData {
    token: String,
    #[serde(rename = "rewardID")]
    reward_id: String,
}

#[post("/reward_redeem")]
async fn reward_redeem(
    data: Json<RedeemData>,
    accounts: Data<Accounts>,
    rewards: Data<Rewards>,
) -> HttpResponse {
    let Some(user) = session_user(&accounts, data.token.as_str()).await else {
        return HttpResponse::Unauthorized().body("not logged in");
    };

    let Ok(outcome) = rewards.redeem(&user.id, data.reward_id.as_str()).await else {
        return HttpResponse::InternalServerError().body("failed to redeem");
    };

    match outcome {
        RedeemOutcome::Redeemed { remaining } => HttpResponse::Ok().json(remaining),
        RedeemOutcome::InsufficientPoints { total, cost } => HttpResponse::BadRequest()
            .body(format!("not enough points: {total} of {cost} required")),
        RedeemOutcome::UnknownReward => HttpResponse::NotFound().body("no such reward"),
    }
}

#[post("/ledger")]
async fn ledger_get(
    data: Json<TokenData>,
    accounts: Data<Accounts>,
    rewards: Data<Rewards>,
) -> HttpResponse {
    let Some(user) = session_user(&accounts, data.token.as_str()).await else {
        return HttpResponse::Unauthorized().body("not logged in");
    };

    let Ok(ledger) = rewards.ledger(&user.id).await else {
        return HttpResponse::InternalServerError().body("failed to fetch data");
    };

    HttpResponse::Ok().json(ledger)
}

async fn fallback() -> HttpResponse {
    HttpResponse::NotFound().body("no endpoint, but connection to api is successful.")
}
