use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    response::IntoResponse,
    Json,
};

use hbnb_core::{City, EntityId, Model, Place, User};
use hbnb_infra::{Storage, StorageExt};

use crate::app::dto::{self, PlacesSearchRequest};
use crate::app::errors::ApiResult;
use crate::app::routes::common;
use crate::context::AppContext;

pub async fn list_places(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(city_id): Path<String>,
) -> ApiResult {
    let city = common::fetch::<City>(&ctx, &city_id)?;
    let places = ctx
        .storage()
        .all_of::<Place>()
        .into_iter()
        .filter(|place| &place.city_id == city.id());
    Ok(Json(dto::list_to_json(places)).into_response())
}

pub async fn create_place(
    Extension(ctx): Extension<Arc<AppContext>>,
    Path(city_id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let _guard = ctx.lock_writes().await;

    let city = common::fetch::<City>(&ctx, &city_id)?;
    let mut attrs = dto::json_object(&body)?;
    let user_id = dto::require_id(&attrs, "user_id")?;
    let user = common::fetch::<User>(&ctx, user_id.as_str())?;
    dto::require(&attrs, "name")?;

    // Links are only made through the place-amenity routes.
    attrs.remove("amenity_ids");
    let mut place: Place = dto::build(attrs)?;
    place.city_id = city.id().clone();
    place.user_id = user.id().clone();
    common::insert(&ctx, place).await
}

pub async fn search_places(Extension(ctx): Extension<Arc<AppContext>>, body: Bytes) -> ApiResult {
    let filter = PlacesSearchRequest::parse(&body)?;
    let places = search(ctx.storage(), &filter);
    Ok(Json(dto::list_to_json(places)).into_response())
}

/// Places of every listed state's cities plus every listed city, narrowed to
/// those linked to all listed amenities. No state or city filter starts from
/// every place.
pub fn search(storage: &dyn Storage, filter: &PlacesSearchRequest) -> Vec<Place> {
    let mut places = storage.all_of::<Place>();

    if !filter.states.is_empty() || !filter.cities.is_empty() {
        let states: BTreeSet<&EntityId> = filter.states.iter().collect();
        let mut cities: BTreeSet<EntityId> = filter.cities.iter().cloned().collect();
        cities.extend(
            storage
                .all_of::<City>()
                .into_iter()
                .filter(|city| states.contains(&city.state_id))
                .map(|city| city.base.id),
        );
        places.retain(|place| cities.contains(&place.city_id));
    }

    if !filter.amenities.is_empty() {
        places.retain(|place| filter.amenities.iter().all(|a| place.has_amenity(a)));
    }

    places
}
