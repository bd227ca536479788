use crate::club::{Club, Committed, SyncOutcome};
use crate::error::{ClubError, ErrorKind};
use crate::models::Review;
use crate::scoring::RestaurantScore;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub type SharedClub = web::Data<Mutex<Club>>;

#[derive(Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct AddRestaurantRequest {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub votes: Vec<u8>,
    // Omitted means "no notes": one empty note per vote
    #[serde(default)]
    pub category_comments: Option<Vec<String>>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Serialize, Deserialize)]
pub struct CommentVoteRequest {
    pub voter: String,
}

#[derive(Deserialize)]
pub struct CompareQuery {
    pub restaurants: String, // Comma separated restaurant names
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Skipped,
    Failed(String),
}

impl From<&SyncOutcome> for SyncStatus {
    fn from(outcome: &SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Synced(_) => SyncStatus::Synced,
            SyncOutcome::Skipped => SyncStatus::Skipped,
            SyncOutcome::Failed(e) => SyncStatus::Failed(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct MutationResponse<T> {
    result: T,
    sync: SyncStatus,
}

#[derive(Serialize)]
struct GroupView<'a> {
    name: &'a str,
    members: &'a [String],
    restaurants: Vec<&'a str>,
}

#[derive(Serialize)]
struct RestaurantView<'a> {
    name: &'a str,
    lat: f64,
    lon: f64,
    categories: &'a [String],
    reviews: &'a [Review],
    score: RestaurantScore,
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    error: String,
}

// Routes under /api, mounted by the server binary and by the tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/categories", web::get().to(get_categories))
            .route("/groups", web::get().to(list_groups))
            .route("/groups", web::post().to(create_group))
            .route("/groups/{group}", web::get().to(get_group))
            .route("/groups/{group}/restaurants", web::post().to(add_restaurant))
            .route("/groups/{group}/restaurants/{restaurant}", web::get().to(get_restaurant))
            .route(
                "/groups/{group}/restaurants/{restaurant}/scores",
                web::get().to(get_reviewer_scores),
            )
            .route(
                "/groups/{group}/restaurants/{restaurant}/reviews/{reviewer}",
                web::put().to(upsert_review),
            )
            .route(
                "/groups/{group}/restaurants/{restaurant}/reviews/{reviewer}/votes",
                web::post().to(vote_comment),
            )
            .route("/groups/{group}/compare", web::get().to(compare))
            .route("/groups/{group}/ranking", web::get().to(ranking))
            .route("/groups/{group}/map", web::get().to(map))
            .route("/backup", web::post().to(resync)),
    );
}

fn reject(err: &ClubError) -> HttpResponse {
    let (mut response, kind) = match err.kind() {
        ErrorKind::Validation if err.is_duplicate() => (HttpResponse::Conflict(), "validation"),
        ErrorKind::Validation => (HttpResponse::BadRequest(), "validation"),
        ErrorKind::NotFound => (HttpResponse::NotFound(), "not_found"),
        ErrorKind::Persistence => (HttpResponse::InternalServerError(), "persistence"),
    };
    response.json(ErrorBody {
        kind,
        error: err.to_string(),
    })
}

fn committed<T: Serialize>(
    action: &str,
    outcome: Result<Committed<T>, ClubError>,
) -> HttpResponse {
    match outcome {
        Ok(done) => {
            if let SyncOutcome::Failed(e) = &done.sync {
                warn!("[API] {} committed locally, backup failed: {}", action, e);
            }
            HttpResponse::Ok().json(MutationResponse {
                sync: SyncStatus::from(&done.sync),
                result: done.value,
            })
        }
        Err(err) => {
            debug!("[API] {} rejected: {}", action, err);
            reject(&err)
        }
    }
}

pub async fn get_categories(club: SharedClub) -> HttpResponse {
    let club = club.lock().await;
    HttpResponse::Ok().json(club.store().categories())
}

pub async fn list_groups(club: SharedClub) -> HttpResponse {
    let club = club.lock().await;
    let names: Vec<&str> = club.store().groups().map(|(name, _)| name).collect();
    HttpResponse::Ok().json(names)
}

pub async fn create_group(
    club: SharedClub,
    request: web::Json<CreateGroupRequest>,
) -> HttpResponse {
    let CreateGroupRequest { name, members } = request.into_inner();
    let mut club = club.lock().await;
    committed("create_group", club.create_group(&name, members).await)
}

pub async fn get_group(club: SharedClub, path: web::Path<String>) -> HttpResponse {
    let name = path.into_inner();
    let club = club.lock().await;
    match club.store().group(&name) {
        Ok(group) => HttpResponse::Ok().json(GroupView {
            name: &name,
            members: &group.members,
            restaurants: group.restaurants.keys().map(String::as_str).collect(),
        }),
        Err(err) => reject(&err),
    }
}

pub async fn add_restaurant(
    club: SharedClub,
    path: web::Path<String>,
    request: web::Json<AddRestaurantRequest>,
) -> HttpResponse {
    let group = path.into_inner();
    let mut club = club.lock().await;
    committed(
        "add_restaurant",
        club.add_restaurant(&group, &request.name, request.lat, request.lon)
            .await,
    )
}

pub async fn get_restaurant(club: SharedClub, path: web::Path<(String, String)>) -> HttpResponse {
    let (group, name) = path.into_inner();
    let club = club.lock().await;
    let view = club.store().restaurant(&group, &name).and_then(|restaurant| {
        Ok(RestaurantView {
            name: &name,
            lat: restaurant.lat,
            lon: restaurant.lon,
            categories: &restaurant.categories,
            reviews: &restaurant.reviews,
            score: club.summary(&group, &name)?,
        })
    });
    match view {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(err) => reject(&err),
    }
}

pub async fn get_reviewer_scores(
    club: SharedClub,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (group, restaurant) = path.into_inner();
    let club = club.lock().await;
    match club.store().reviewer_scores(&group, &restaurant) {
        Ok(scores) => HttpResponse::Ok().json(scores),
        Err(err) => reject(&err),
    }
}

pub async fn upsert_review(
    club: SharedClub,
    path: web::Path<(String, String, String)>,
    request: web::Json<ReviewRequest>,
) -> HttpResponse {
    let (group, restaurant, reviewer) = path.into_inner();
    let ReviewRequest {
        votes,
        category_comments,
        comment,
    } = request.into_inner();
    let category_comments = category_comments.unwrap_or_else(|| vec![String::new(); votes.len()]);

    let mut club = club.lock().await;
    committed(
        "upsert_review",
        club.upsert_review(&group, &restaurant, &reviewer, votes, category_comments, &comment)
            .await,
    )
}

pub async fn vote_comment(
    club: SharedClub,
    path: web::Path<(String, String, String)>,
    request: web::Json<CommentVoteRequest>,
) -> HttpResponse {
    let (group, restaurant, target) = path.into_inner();
    let mut club = club.lock().await;
    committed(
        "vote_comment",
        club.vote_comment(&group, &restaurant, &request.voter, &target)
            .await,
    )
}

pub async fn compare(
    club: SharedClub,
    path: web::Path<String>,
    query: web::Query<CompareQuery>,
) -> HttpResponse {
    let group = path.into_inner();
    let names: Vec<String> = query
        .restaurants
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    let club = club.lock().await;
    match club.compare(&group, &names) {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(err) => reject(&err),
    }
}

pub async fn ranking(club: SharedClub, path: web::Path<String>) -> HttpResponse {
    let club = club.lock().await;
    match club.ranking(&path) {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(err) => reject(&err),
    }
}

pub async fn map(club: SharedClub, path: web::Path<String>) -> HttpResponse {
    let club = club.lock().await;
    match club.store().locations(&path) {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(err) => reject(&err),
    }
}

pub async fn resync(club: SharedClub) -> HttpResponse {
    let club = club.lock().await;
    match club.resync().await {
        Ok(outcome) => HttpResponse::Ok().json(SyncStatus::from(&outcome)),
        Err(err) => reject(&err),
    }
}
