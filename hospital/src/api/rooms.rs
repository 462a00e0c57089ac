//! Room management endpoints.
//!
//! - POST /room/add - Create a room (admin)
//! - PUT /room/update/:room_id - Change an empty room (admin)
//! - GET /room/available - Rooms that can take a patient, by kind
//! - GET /room - Every room
//! - DELETE /room/room-delete/:room_id - Remove an empty room (admin)

use super::{MessageResponse, amount};
use crate::auth::{Authenticated, Capability};
use crate::occupancy::{AddRoom, UpdateRoom};
use crate::server::state::AppState;
use crate::store::HospitalStore;
use crate::types::{Amount, Room, RoomId, RoomKind, RoomStatus};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use medbay_web::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a room.
#[derive(Debug, Deserialize)]
pub struct AddRoomRequest {
    /// Room number
    pub room_number: String,
    /// Room kind
    #[serde(rename = "type", alias = "room_type")]
    pub kind: RoomKind,
    /// Charge per day
    #[serde(alias = "daily_rate")]
    pub charges_per_day: f64,
    /// Beds, General rooms only
    pub capacity: Option<u32>,
}

/// Request to change a room. Absent fields keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoomRequest {
    /// New room number
    pub room_number: Option<String>,
    /// New kind
    #[serde(default, rename = "type", alias = "room_type")]
    pub kind: Option<RoomKind>,
    /// New charge per day
    #[serde(default, alias = "daily_rate")]
    pub charges_per_day: Option<f64>,
    /// New capacity
    pub capacity: Option<u32>,
}

/// A room as shown to clients.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RoomResponse {
    /// Room ID
    pub room_id: RoomId,
    /// Room number
    pub room_number: String,
    /// Room kind
    #[serde(rename = "type")]
    pub kind: RoomKind,
    /// Charge per day
    pub charges_per_day: Amount,
    /// Derived status
    pub status: RoomStatus,
    /// Beds (General only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    /// Beds taken (General only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupied_count: Option<u32>,
    /// Beds free (General only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_capacity: Option<u32>,
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            status: room.status(),
            capacity: room.occupancy.capacity(),
            occupied_count: room.occupancy.occupied_count(),
            remaining_capacity: room.occupancy.remaining_capacity(),
            room_id: room.id,
            room_number: room.number,
            kind: room.kind,
            charges_per_day: room.daily_rate,
        }
    }
}

/// Response carrying one room.
#[derive(Debug, Serialize)]
pub struct RoomChangedResponse {
    /// Success message
    pub message: String,
    /// The room after the change
    pub room: RoomResponse,
}

/// Every room.
#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    /// Rooms ordered by number
    pub rooms: Vec<RoomResponse>,
}

/// Rooms that can take a patient.
#[derive(Debug, Serialize)]
pub struct AvailableRoomsResponse {
    /// Keyed by room kind
    pub available_rooms: BTreeMap<RoomKind, Vec<RoomResponse>>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a room.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/room/add \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"room_number": "G-1", "type": "General", "charges_per_day": 1500, "capacity": 6}'
/// ```
pub async fn add_room<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Json(request): Json<AddRoomRequest>,
) -> Result<(StatusCode, Json<RoomChangedResponse>), AppError> {
    principal.require(Capability::ManageRooms)?;

    let room = state
        .occupancy
        .add_room(AddRoom {
            number: request.room_number,
            kind: request.kind,
            daily_rate: amount("charges_per_day", request.charges_per_day)?,
            capacity: request.capacity,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RoomChangedResponse {
            message: "Room added successfully".to_string(),
            room: room.into(),
        }),
    ))
}

/// Change an empty room.
pub async fn update_room<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Path(room_id): Path<RoomId>,
    Json(request): Json<UpdateRoomRequest>,
) -> Result<Json<RoomChangedResponse>, AppError> {
    principal.require(Capability::ManageRooms)?;

    let daily_rate = request
        .charges_per_day
        .map(|rate| amount("charges_per_day", rate))
        .transpose()?;
    let room = state
        .occupancy
        .update_room(
            room_id,
            UpdateRoom {
                number: request.room_number,
                kind: request.kind,
                daily_rate,
                capacity: request.capacity,
            },
        )
        .await?;

    Ok(Json(RoomChangedResponse {
        message: "Room updated successfully".to_string(),
        room: room.into(),
    }))
}

/// Rooms with a free bed, grouped by kind.
pub async fn available_rooms<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
) -> Result<Json<AvailableRoomsResponse>, AppError> {
    principal.require(Capability::ViewRooms)?;

    let grouped = state.occupancy.available_rooms().await?;
    Ok(Json(AvailableRoomsResponse {
        available_rooms: grouped
            .into_iter()
            .map(|(kind, rooms)| (kind, rooms.into_iter().map(RoomResponse::from).collect()))
            .collect(),
    }))
}

/// Every room.
pub async fn list_rooms<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
) -> Result<Json<RoomsResponse>, AppError> {
    principal.require(Capability::ViewRooms)?;

    let rooms = state.occupancy.rooms().await?;
    Ok(Json(RoomsResponse {
        rooms: rooms.into_iter().map(RoomResponse::from).collect(),
    }))
}

/// Remove an empty room without admission history.
pub async fn delete_room<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<MessageResponse>, AppError> {
    principal.require(Capability::ManageRooms)?;

    state.occupancy.delete_room(room_id).await?;
    Ok(Json(MessageResponse::new("Room deleted successfully")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::occupancy::Occupancy;

    #[test]
    fn general_rooms_report_bed_counts() {
        let room = Room {
            id: RoomId::new(3),
            number: "G-1".to_string(),
            kind: RoomKind::General,
            daily_rate: Amount::from_units(900),
            occupancy: Occupancy::Shared {
                capacity: 4,
                occupied: 1,
            },
        };
        let body = serde_json::to_value(RoomResponse::from(room)).unwrap();
        assert_eq!(body["status"], "Partially Occupied");
        assert_eq!(body["remaining_capacity"], 3);
        assert_eq!(body["type"], "General");
    }

    #[test]
    fn single_rooms_omit_bed_counts() {
        let room = Room {
            id: RoomId::new(1),
            number: "ICU-2".to_string(),
            kind: RoomKind::Icu,
            daily_rate: Amount::from_units(5000),
            occupancy: Occupancy::Single { occupied: true },
        };
        let body = serde_json::to_value(RoomResponse::from(room)).unwrap();
        assert_eq!(body["status"], "Occupied");
        assert!(body.get("capacity").is_none());
    }

    #[test]
    fn add_room_accepts_both_field_spellings() {
        let request: AddRoomRequest = serde_json::from_str(
            r#"{"room_number":"N-4","room_type":"Normal","daily_rate":1200}"#,
        )
        .unwrap();
        assert_eq!(request.kind, RoomKind::Normal);
        assert!((request.charges_per_day - 1200.0).abs() < f64::EPSILON);
    }
}
