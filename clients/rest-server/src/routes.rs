use actix_web::{http::header, web, HttpRequest, HttpResponse};
use database::{
    consts::consts::EntityId,
    database::table::filter::{PersonFilter, RawPersonQuery},
};
use serde::Deserialize;

use crate::{
    auth::{authenticate, authenticate_staff},
    errors::ApiError,
    pagination::PageNumberPagination,
    serializers::{FilterPersonResponse, InputMode, PersonInput, PersonResponse},
    state::AppState,
};

#[derive(Deserialize, Debug, Default)]
pub struct PageParams {
    pub page: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct FilterPersonParams {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub min_age: Option<String>,
    pub max_age: Option<String>,
    pub page: Option<String>,
}

/// Registers every route along with the extractor error handlers that keep error bodies consistent
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(web::PathConfig::default().error_handler(|_err, _req| ApiError::NotFound.into()))
    .service(
        web::resource("/person/")
            .name("person_list")
            .route(web::get().to(list_persons))
            .route(web::post().to(create_person)),
    )
    .service(
        web::resource("/person/{id}/")
            .name("person_detail")
            .route(web::get().to(retrieve_person))
            .route(web::put().to(replace_person))
            .route(web::patch().to(partial_update_person))
            .route(web::delete().to(destroy_person)),
    )
    .service(
        web::resource("/filter-person/")
            .name("filter_person_list")
            .route(web::get().to(filter_persons)),
    );
}

/// An empty body is an empty object, anything else must be valid json
fn parse_person_input(body: &[u8]) -> Result<PersonInput, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PersonInput::default());
    }

    serde_json::from_slice(body).map_err(|e| ApiError::JsonParse(e.to_string()))
}

async fn list_persons(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    authenticate_staff(&req, &state).await?;

    let people = state
        .database(|request_manager| request_manager.send_list(None))
        .await?;

    let today = state.today();

    let page = PageNumberPagination::new(state.page_size)
        .paginate(people, params.page.as_deref(), &req)?
        .try_map(|person| PersonResponse::new(&req, person, today))?;

    Ok(HttpResponse::Ok().json(page))
}

async fn create_person(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    authenticate_staff(&req, &state).await?;

    let changes = parse_person_input(&body)?.validate(InputMode::Create)?;
    let new_person = web::block(move || changes.hash_password())
        .await??
        .into_new_person();

    let person = state
        .database(move |request_manager| request_manager.send_add(new_person))
        .await?;

    log::info!("Created person [{}] {}", person.id, person.username);

    let response = PersonResponse::new(&req, person, state.today())?;

    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, response.url.clone()))
        .json(response))
}

async fn retrieve_person(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    authenticate_staff(&req, &state).await?;

    let id = EntityId(path.into_inner());

    let person = state
        .database(move |request_manager| request_manager.send_get(id))
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(HttpResponse::Ok().json(PersonResponse::new(&req, person, state.today())?))
}

async fn update_person(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: EntityId,
    body: web::Bytes,
    mode: InputMode,
) -> Result<HttpResponse, ApiError> {
    authenticate_staff(&req, &state).await?;

    // Unknown ids are reported before the body is looked at
    state
        .database(move |request_manager| request_manager.send_get(id))
        .await?
        .ok_or(ApiError::NotFound)?;

    let changes = parse_person_input(&body)?.validate(mode)?;
    let update = web::block(move || changes.hash_password())
        .await??
        .into_update();

    let person = state
        .database(move |request_manager| request_manager.send_update(id, update))
        .await?;

    Ok(HttpResponse::Ok().json(PersonResponse::new(&req, person, state.today())?))
}

async fn replace_person(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    update_person(req, state, EntityId(path.into_inner()), body, InputMode::Replace).await
}

async fn partial_update_person(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    update_person(req, state, EntityId(path.into_inner()), body, InputMode::Partial).await
}

async fn destroy_person(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    authenticate_staff(&req, &state).await?;

    let id = EntityId(path.into_inner());

    let person = state
        .database(move |request_manager| request_manager.send_remove(id))
        .await?;

    log::info!("Removed person [{}] {}", person.id, person.username);

    Ok(HttpResponse::NoContent().finish())
}

/// Open to every authenticated account, ages are computed against today's date
async fn filter_persons(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<FilterPersonParams>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state).await?;

    let FilterPersonParams {
        first_name,
        last_name,
        min_age,
        max_age,
        page,
    } = params.into_inner();

    let query = RawPersonQuery {
        first_name,
        last_name,
        min_age,
        max_age,
    }
    .parse()?;

    let today = state.today();
    let person_filter = PersonFilter::new(query, today);

    let people = state
        .database(move |request_manager| request_manager.send_list(Some(person_filter)))
        .await?;

    let page = PageNumberPagination::new(state.page_size)
        .paginate(people, page.as_deref(), &req)?
        .try_map(|person| FilterPersonResponse::new(&req, person, today))?;

    Ok(HttpResponse::Ok().json(page))
}
