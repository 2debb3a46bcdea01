use axum::{
    routing::{get, post},
    Router,
};

use hbnb_core::{Amenity, City, Place, Review, State, User};

use crate::app::errors::ApiError;

pub mod amenities;
pub mod cities;
pub mod common;
pub mod index;
pub mod places;
pub mod places_amenities;
pub mod reviews;
pub mod states;
pub mod users;

use common::{list, remove, show, update};

/// Router for every `/api/v1` endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/status", get(index::status))
        .route("/stats", get(index::stats))
        .route("/states", get(list::<State>).post(states::create_state))
        .route("/states/:id", get(show::<State>).put(update::<State>).delete(remove::<State>))
        .route("/states/:id/cities", get(cities::list_cities).post(cities::create_city))
        .route("/cities/:id", get(show::<City>).put(cities::update_city).delete(remove::<City>))
        .route("/amenities", get(list::<Amenity>).post(amenities::create_amenity))
        .route(
            "/amenities/:id",
            get(show::<Amenity>).put(update::<Amenity>).delete(remove::<Amenity>),
        )
        .route("/users", get(list::<User>).post(users::create_user))
        .route("/users/:id", get(show::<User>).put(update::<User>).delete(remove::<User>))
        .route("/cities/:id/places", get(places::list_places).post(places::create_place))
        .route("/places/:id", get(show::<Place>).put(update::<Place>).delete(remove::<Place>))
        .route("/places_search", post(places::search_places))
        .route("/places/:id/reviews", get(reviews::list_reviews).post(reviews::create_review))
        .route("/reviews/:id", get(show::<Review>).put(update::<Review>).delete(remove::<Review>))
        .route("/places/:id/amenities", get(places_amenities::list_place_amenities))
        .route(
            "/places/:id/amenities/:amenity_id",
            post(places_amenities::link_amenity).delete(places_amenities::unlink_amenity),
        )
}

/// Fallback for unmatched paths.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}
