//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use common::{
    access::filter_by_location,
    identity::Identity,
    middleware::require_session,
    phone::{is_lookup_candidate, normalize_phone},
};
use serde_json::json;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    models::{
        AppointmentListResponse, AppointmentQuery, ClientLookupQuery, ClientLookupResponse,
        SaleListResponse, SaleQuery,
    },
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/appointments", get(list_appointments))
        .route("/sales", get(list_sales))
        .route("/clients/lookup", get(lookup_client))
        .route_layer(middleware::from_fn_with_state(
            state.guard.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);
    let cache = state.guard.sessions.health_check().await.unwrap_or(false);

    let status = if database && cache {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "api-service",
            "database": database,
            "cache": cache,
        })),
    )
}

/// List appointments visible to the caller
pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<AppointmentQuery>,
) -> ApiResult<Json<AppointmentListResponse>> {
    let appointments = state.appointments.list(&query).await?;
    let fetched = appointments.len();

    let appointments = filter_by_location(appointments, &identity.locations);
    if appointments.len() != fetched {
        info!(
            "Location access for user {} hid {} of {} appointments",
            identity.id,
            fetched - appointments.len(),
            fetched
        );
    }

    Ok(Json(AppointmentListResponse {
        total: appointments.len(),
        appointments,
    }))
}

/// List sales visible to the caller
pub async fn list_sales(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<SaleQuery>,
) -> ApiResult<Json<SaleListResponse>> {
    let sales = state.sales.list(query.location_id.as_deref()).await?;
    let sales = filter_by_location(sales, &identity.locations);

    Ok(Json(SaleListResponse {
        total: sales.len(),
        sales,
    }))
}

/// Look a client up by phone number
pub async fn lookup_client(
    State(state): State<AppState>,
    Query(query): Query<ClientLookupQuery>,
) -> ApiResult<Json<ClientLookupResponse>> {
    let phone = query
        .phone
        .filter(|phone| !phone.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Phone number is required".to_string()))?;

    let normalized = normalize_phone(&phone);
    if !is_lookup_candidate(&normalized) {
        return Ok(Json(ClientLookupResponse {
            found: false,
            client: None,
            message: "Phone number too short for lookup".to_string(),
            normalized_phone: None,
        }));
    }

    let response = match state.clients.find_by_phone(&normalized).await? {
        Some(client) => ClientLookupResponse {
            found: true,
            client: Some(client),
            message: "Client found".to_string(),
            normalized_phone: None,
        },
        None => ClientLookupResponse {
            found: false,
            client: None,
            message: "No client found with this phone number".to_string(),
            normalized_phone: Some(normalized),
        },
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Appointment, Client, Sale},
        repositories::{AppointmentStore, ClientDirectory, SaleStore},
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use common::{
        cache::MemoryStore,
        cookie::CookieConfig,
        error::DatabaseResult,
        identity::{LocationAccess, Role},
        middleware::SessionGuard,
        session::{SessionConfig, SessionManager},
        token::{DEFAULT_MAX_AGE, JwtConfig, JwtService},
    };
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    struct FixedAppointments(Vec<Appointment>);

    #[async_trait]
    impl AppointmentStore for FixedAppointments {
        async fn list(&self, query: &AppointmentQuery) -> DatabaseResult<Vec<Appointment>> {
            Ok(self
                .0
                .iter()
                .filter(|a| query.location_id.as_ref().is_none_or(|l| &a.location_id == l))
                .cloned()
                .collect())
        }
    }

    struct FixedSales(Vec<Sale>);

    #[async_trait]
    impl SaleStore for FixedSales {
        async fn list(&self, _location_id: Option<&str>) -> DatabaseResult<Vec<Sale>> {
            Ok(self.0.clone())
        }
    }

    struct FixedClients(Vec<Client>);

    #[async_trait]
    impl ClientDirectory for FixedClients {
        async fn find_by_phone(&self, normalized_phone: &str) -> DatabaseResult<Option<Client>> {
            Ok(self
                .0
                .iter()
                .find(|c| normalize_phone(&c.phone) == normalized_phone)
                .cloned())
        }
    }

    fn appointment(id: &str, location_id: &str) -> Appointment {
        let date = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        Appointment {
            id: id.to_string(),
            client_id: "client-1".to_string(),
            client_name: "Noor".to_string(),
            staff_id: "staff-1".to_string(),
            staff_name: "Sara Ahmed".to_string(),
            service_id: "svc-1".to_string(),
            service: "Haircut".to_string(),
            date,
            duration: 45,
            location_id: location_id.to_string(),
            location_name: location_id.to_uppercase(),
            price: 120.0,
            notes: String::new(),
            status: "CONFIRMED".to_string(),
            payment_status: "unpaid".to_string(),
            created_at: date,
            updated_at: date,
        }
    }

    fn sale(id: &str, location_id: &str) -> Sale {
        Sale {
            id: id.to_string(),
            client_id: None,
            client_name: None,
            staff_id: "staff-1".to_string(),
            staff_name: None,
            location_id: location_id.to_string(),
            location_name: None,
            subtotal: 100.0,
            total_amount: 100.0,
            payment_method: Some("CASH".to_string()),
            payment_status: "COMPLETED".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn client(phone: &str) -> Client {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Client {
            id: "user-9".to_string(),
            client_record_id: "client-9".to_string(),
            name: "Noor".to_string(),
            email: "noor@example.com".to_string(),
            phone: phone.to_string(),
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn state() -> AppState {
        let jwt_service = JwtService::new(JwtConfig {
            secret: "a-test-secret-that-is-long-enough-0000".to_string(),
            max_age: DEFAULT_MAX_AGE,
        })
        .unwrap();

        AppState {
            db_pool: PgPoolOptions::new()
                .connect_lazy("postgres://localhost/vanity_hub")
                .unwrap(),
            guard: SessionGuard {
                sessions: SessionManager::new(
                    SessionConfig::default(),
                    jwt_service,
                    Arc::new(MemoryStore::new()),
                ),
                cookies: CookieConfig {
                    secure: false,
                    max_age: DEFAULT_MAX_AGE,
                },
            },
            appointments: Arc::new(FixedAppointments(vec![
                appointment("a1", "loc1"),
                appointment("a2", "loc2"),
            ])),
            sales: Arc::new(FixedSales(vec![sale("s1", "loc2"), sale("s2", "loc1")])),
            clients: Arc::new(FixedClients(vec![client("+974 5512 3456")])),
        }
    }

    fn identity(locations: LocationAccess) -> Identity {
        Identity {
            id: "staff-1".to_string(),
            name: "Sara Ahmed".to_string(),
            email: "sara@vanityhub.com".to_string(),
            role: Role::Staff,
            locations,
        }
    }

    #[tokio::test]
    async fn test_appointments_are_filtered_by_location_access() {
        let Json(response) = list_appointments(
            State(state()),
            Extension(identity(LocationAccess::Only(vec!["loc1".to_string()]))),
            Query(AppointmentQuery::default()),
        )
        .await
        .unwrap();

        assert_eq!(response.total, 1);
        assert_eq!(response.appointments[0].id, "a1");
    }

    #[tokio::test]
    async fn test_admin_sees_every_appointment() {
        let Json(response) = list_appointments(
            State(state()),
            Extension(identity(LocationAccess::All)),
            Query(AppointmentQuery::default()),
        )
        .await
        .unwrap();

        let ids: Vec<_> = response.appointments.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn test_explicit_location_outside_access_is_empty() {
        let Json(response) = list_appointments(
            State(state()),
            Extension(identity(LocationAccess::Only(vec!["loc1".to_string()]))),
            Query(AppointmentQuery {
                location_id: Some("loc2".to_string()),
                ..AppointmentQuery::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.total, 0);
    }

    #[tokio::test]
    async fn test_sales_keep_order_after_filtering() {
        let Json(response) = list_sales(
            State(state()),
            Extension(identity(LocationAccess::Only(vec!["loc2".to_string()]))),
            Query(SaleQuery::default()),
        )
        .await
        .unwrap();

        assert_eq!(response.total, 1);
        assert_eq!(response.sales[0].id, "s1");
    }

    #[tokio::test]
    async fn test_lookup_requires_phone() {
        let result = lookup_client(State(state()), Query(ClientLookupQuery { phone: None })).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_lookup_rejects_short_numbers() {
        let Json(response) = lookup_client(
            State(state()),
            Query(ClientLookupQuery {
                phone: Some("974".to_string()),
            }),
        )
        .await
        .unwrap();

        assert!(!response.found);
        assert_eq!(response.message, "Phone number too short for lookup");
    }

    #[tokio::test]
    async fn test_lookup_matches_any_spelling_of_the_number() {
        for phone in ["55123456", "0097455123456", "+974-5512-3456"] {
            let Json(response) = lookup_client(
                State(state()),
                Query(ClientLookupQuery {
                    phone: Some(phone.to_string()),
                }),
            )
            .await
            .unwrap();

            assert!(response.found, "{} should match", phone);
            assert_eq!(response.client.unwrap().id, "user-9");
        }
    }

    #[tokio::test]
    async fn test_lookup_reports_unknown_number() {
        let Json(response) = lookup_client(
            State(state()),
            Query(ClientLookupQuery {
                phone: Some("66123456".to_string()),
            }),
        )
        .await
        .unwrap();

        assert!(!response.found);
        assert_eq!(response.normalized_phone.as_deref(), Some("97466123456"));
    }
}
