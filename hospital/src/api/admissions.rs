//! Admission endpoints.
//!
//! - POST /admission/admit - Admit a patient to a room
//! - PUT /admission/fees/:admission_id - Charge and collect on an admission
//! - PUT /admission/discharge/:admission_id - Discharge and settle the bill
//! - GET /admission/admitted-patients - Open admissions

use super::amount;
use crate::auth::{Authenticated, Capability};
use crate::error::HospitalError;
use crate::occupancy::{AdmitPatient, PatientRef, PaymentInput, RecordPayment};
use crate::server::state::AppState;
use crate::store::HospitalStore;
use crate::types::{Admission, AdmissionId, AdmittedPatient, Amount, PatientId, RoomId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use medbay_web::AppError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// One payment as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentDetail {
    /// Amount paid
    pub amount: f64,
    /// Payment method
    pub method: Option<String>,
    /// Free-form note
    pub note: Option<String>,
}

impl PaymentDetail {
    fn into_input(self) -> Result<PaymentInput, HospitalError> {
        Ok(PaymentInput {
            amount: amount("amount", self.amount)?,
            method: self.method,
            note: self.note,
        })
    }
}

/// Request to admit a patient. The patient is named by id or login name.
#[derive(Debug, Deserialize)]
pub struct AdmitRequest {
    /// Patient login name
    pub patient_name: Option<String>,
    /// Patient ID, when the login name is not given
    pub patient_id: Option<PatientId>,
    /// Target room
    pub room_id: RoomId,
    /// Fees charged at admission
    pub total_fees: f64,
    /// Outstanding balance after the initial payments
    pub remaining_fees: f64,
    /// Payments taken at admission
    #[serde(default)]
    pub fee_paid_details: Vec<PaymentDetail>,
}

/// Response after admitting a patient.
#[derive(Debug, Serialize)]
pub struct AdmitResponse {
    /// Success message
    pub message: String,
    /// The open admission
    pub admission: Admission,
}

/// Request to charge and collect on an admission.
#[derive(Debug, Deserialize)]
pub struct UpdateFeesRequest {
    /// Additional charges
    pub extra_amount: f64,
    /// Payment received
    pub paid_amount: f64,
    /// Payment method
    pub method: Option<String>,
    /// Free-form note
    pub note: Option<String>,
}

/// Fee totals after an update.
#[derive(Debug, Serialize)]
pub struct UpdateFeesResponse {
    /// Success message
    pub message: String,
    /// Fees charged so far
    pub total_fees: Amount,
    /// Payment received with this update
    pub paid_amount: Amount,
    /// Outstanding balance
    pub remaining_fees: Amount,
}

/// Bill at discharge.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Billing {
    /// Fees charged
    pub total_fees: Amount,
    /// Fees paid
    pub fee_paid: Amount,
    /// Outstanding balance
    pub remaining_fees: Amount,
}

impl Billing {
    fn of(admission: &Admission) -> Self {
        Self {
            total_fees: admission.total_fee,
            fee_paid: admission.total_fee - admission.remaining_fee,
            remaining_fees: admission.remaining_fee,
        }
    }
}

/// Response after discharge.
#[derive(Debug, Serialize)]
pub struct DischargeResponse {
    /// Success message
    pub message: String,
    /// Final bill
    pub billing: Billing,
    /// The closed admission
    pub patient: Admission,
}

/// Open admissions.
#[derive(Debug, Serialize)]
pub struct AdmittedPatientsResponse {
    /// Newest first
    pub admitted_patients: Vec<AdmittedPatient>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Admit a patient.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/admission/admit \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "patient_name": "asha",
///     "room_id": 4,
///     "total_fees": 10000,
///     "remaining_fees": 7000,
///     "fee_paid_details": [{"amount": 3000, "method": "card"}]
///   }'
/// ```
pub async fn admit<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Json(request): Json<AdmitRequest>,
) -> Result<(StatusCode, Json<AdmitResponse>), AppError> {
    principal.require(Capability::ManageAdmissions)?;

    let patient = match (request.patient_name, request.patient_id) {
        (Some(username), _) if !username.trim().is_empty() => {
            PatientRef::Username(username.trim().to_string())
        }
        (_, Some(id)) => PatientRef::Id(id),
        _ => {
            return Err(
                HospitalError::validation("patient_name or patient_id is required").into(),
            );
        }
    };
    let payments = request
        .fee_paid_details
        .into_iter()
        .map(PaymentDetail::into_input)
        .collect::<Result<Vec<_>, _>>()?;

    let admission = state
        .occupancy
        .admit(AdmitPatient {
            patient,
            room_id: request.room_id,
            total_fee: amount("total_fees", request.total_fees)?,
            remaining_fee: amount("remaining_fees", request.remaining_fees)?,
            payments,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AdmitResponse {
            message: "Patient admitted successfully".to_string(),
            admission,
        }),
    ))
}

/// Charge extra fees and record a payment.
pub async fn update_fees<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Path(admission_id): Path<AdmissionId>,
    Json(request): Json<UpdateFeesRequest>,
) -> Result<Json<UpdateFeesResponse>, AppError> {
    principal.require(Capability::ManageAdmissions)?;

    let paid = amount("paid_amount", request.paid_amount)?;
    let admission = state
        .occupancy
        .record_payment(RecordPayment {
            admission_id,
            extra_charges: amount("extra_amount", request.extra_amount)?,
            paid: PaymentInput {
                amount: paid,
                method: request.method,
                note: request.note,
            },
        })
        .await?;

    Ok(Json(UpdateFeesResponse {
        message: "Fees updated successfully".to_string(),
        total_fees: admission.total_fee,
        paid_amount: paid,
        remaining_fees: admission.remaining_fee,
    }))
}

/// Discharge a patient and free the bed.
pub async fn discharge<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
    Path(admission_id): Path<AdmissionId>,
) -> Result<Json<DischargeResponse>, AppError> {
    principal.require(Capability::ManageAdmissions)?;

    let admission = state.occupancy.discharge(admission_id).await?;
    Ok(Json(DischargeResponse {
        message: "Patient discharged and room status updated".to_string(),
        billing: Billing::of(&admission),
        patient: admission,
    }))
}

/// Patients currently admitted.
pub async fn admitted_patients<D: HospitalStore>(
    Authenticated(principal): Authenticated,
    State(state): State<AppState<D>>,
) -> Result<Json<AdmittedPatientsResponse>, AppError> {
    principal.require(Capability::ViewAdmissions)?;

    let admitted_patients = state.occupancy.admitted().await?;
    Ok(Json(AdmittedPatientsResponse { admitted_patients }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn billing_reports_what_was_paid() {
        let admitted_at = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let admission = Admission {
            id: AdmissionId::new(1),
            patient_id: PatientId::new(2),
            room_id: RoomId::new(3),
            admit_time: admitted_at,
            discharge_time: Some(admitted_at),
            total_fee: Amount::from_units(1200),
            remaining_fee: Amount::from_units(700),
            payments: Vec::new(),
        };
        assert_eq!(
            Billing::of(&admission),
            Billing {
                total_fees: Amount::from_units(1200),
                fee_paid: Amount::from_units(500),
                remaining_fees: Amount::from_units(700),
            }
        );
    }

    #[test]
    fn admit_request_defaults_to_no_payments() {
        let request: AdmitRequest = serde_json::from_str(
            r#"{"patient_name":"asha","room_id":4,"total_fees":1000,"remaining_fees":1000}"#,
        )
        .unwrap();
        assert!(request.fee_paid_details.is_empty());
        assert_eq!(request.room_id, RoomId::new(4));
    }
}
