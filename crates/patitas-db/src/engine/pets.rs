//! Pet resolution for service lines.
//!
//! Resolution order is load-bearing: explicit reference, then the
//! customer's first registered pet, then the generic fallback for
//! walk-in customers. It is the only mechanism guaranteeing that every
//! persisted service line carries a pet reference, which downstream
//! reporting assumes.

use sqlx::SqliteConnection;

use crate::engine::request::ServiceLineSpec;
use crate::error::{EngineError, EngineResult};
use crate::repository::CustomerRepository;
use patitas_core::{CoreError, Customer, GENERIC_PET_ID};

/// Outcome of resolving one service line's pet.
#[derive(Debug, Clone)]
pub(super) struct ResolvedPet {
    pub pet_id: String,
    /// Display-only descriptor, kept for walk-in sales only.
    pub temp_name: Option<String>,
    pub temp_species: Option<String>,
}

/// Resolves the pet a service line attaches to.
///
/// - Walk-in customer: the reserved generic pet, optionally decorated
///   with the caller's temporary name/species for display.
/// - Explicit `pet_id`: must exist and belong to the sale's customer,
///   otherwise `PetOwnershipMismatch`.
/// - Neither: the customer's first active pet ordered by id ascending,
///   or `NoRegisteredPet` when they have none.
pub(super) async fn resolve_pet(
    conn: &mut SqliteConnection,
    customer: &Customer,
    line: &ServiceLineSpec,
) -> EngineResult<ResolvedPet> {
    if customer.is_walk_in() {
        return Ok(ResolvedPet {
            pet_id: GENERIC_PET_ID.to_string(),
            temp_name: line.temp_pet_name.clone(),
            temp_species: line.temp_pet_species.clone(),
        });
    }

    if let Some(pet_id) = &line.pet_id {
        let pet = CustomerRepository::fetch_pet_in_tx(conn, pet_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Pet", pet_id))?;

        if pet.customer_id != customer.id {
            return Err(CoreError::PetOwnershipMismatch {
                pet_id: pet.id,
                customer_id: customer.id.clone(),
            }
            .into());
        }

        return Ok(ResolvedPet {
            pet_id: pet.id,
            temp_name: None,
            temp_species: None,
        });
    }

    let pet = CustomerRepository::first_active_pet_in_tx(conn, &customer.id)
        .await?
        .ok_or_else(|| {
            EngineError::from(CoreError::NoRegisteredPet {
                customer_id: customer.id.clone(),
            })
        })?;

    Ok(ResolvedPet {
        pet_id: pet.id,
        temp_name: None,
        temp_species: None,
    })
}
