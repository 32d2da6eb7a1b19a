//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random workflow data
//! that maintains domain invariants.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use core_kernel::{BordereauId, ClientId, Role, UserId};
use domain_bordereau::{Bordereau, DocumentStatut, Ownership, Priorite, Statut};
use domain_dispatch::AssignmentPolicy;

use crate::builders::BordereauBuilder;

/// Strategy for generating any of the sixteen statuses
pub fn statut_strategy() -> impl Strategy<Value = Statut> {
    proptest::sample::select(Statut::ALL.to_vec())
}

/// Strategy for statuses a handler is actively charged with
pub fn active_statut_strategy() -> impl Strategy<Value = Statut> {
    prop_oneof![
        Just(Statut::Assigne),
        Just(Statut::EnCours),
        Just(Statut::MisEnInstance),
    ]
}

/// Strategy for statuses a chef may dispatch from
pub fn assignable_statut_strategy() -> impl Strategy<Value = Statut> {
    prop_oneof![
        Just(Statut::Scanne),
        Just(Statut::AAffecter),
        Just(Statut::Rejete),
        Just(Statut::EnDifficulte),
    ]
}

/// Strategy for generating valid Priorite values
pub fn priorite_strategy() -> impl Strategy<Value = Priorite> {
    prop_oneof![
        Just(Priorite::Normale),
        Just(Priorite::Haute),
        Just(Priorite::Urgente),
    ]
}

/// Strategy for generating valid DocumentStatut values
pub fn document_statut_strategy() -> impl Strategy<Value = DocumentStatut> {
    prop_oneof![
        Just(DocumentStatut::Uploaded),
        Just(DocumentStatut::EnCours),
        Just(DocumentStatut::Traite),
        Just(DocumentStatut::RetourAdmin),
    ]
}

/// Strategy for generating any Role
pub fn role_strategy() -> impl Strategy<Value = Role> {
    proptest::sample::select(Role::ALL.to_vec())
}

/// Strategy for roles that carry personal work queues
pub fn handler_role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Gestionnaire), Just(Role::GestionnaireSenior)]
}

/// Strategy for generating valid AssignmentPolicy values
pub fn assignment_policy_strategy() -> impl Strategy<Value = AssignmentPolicy> {
    prop_oneof![
        Just(AssignmentPolicy::LowestLoad),
        Just(AssignmentPolicy::RoundRobin),
        Just(AssignmentPolicy::CapacityBased),
    ]
}

/// Strategy for generating BordereauId
pub fn bordereau_id_strategy() -> impl Strategy<Value = BordereauId> {
    any::<[u8; 16]>().prop_map(|bytes| BordereauId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating UserId
pub fn user_id_strategy() -> impl Strategy<Value = UserId> {
    any::<[u8; 16]>().prop_map(|bytes| UserId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating ClientId
pub fn client_id_strategy() -> impl Strategy<Value = ClientId> {
    any::<[u8; 16]>().prop_map(|bytes| ClientId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating bordereau references in the batch format
pub fn reference_strategy() -> impl Strategy<Value = String> {
    (2020u32..2030u32, 1u32..10000u32).prop_map(|(year, seq)| format!("BRD-{}-{:04}", year, seq))
}

/// Strategy for declared slip counts
pub fn nombre_bs_strategy() -> impl Strategy<Value = i32> {
    0i32..500i32
}

/// Strategy for contractual settlement windows in days
pub fn delai_strategy() -> impl Strategy<Value = i64> {
    1i64..=90i64
}

/// Strategy for reception timestamps within 2025
pub fn reception_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..365i64).prop_map(|days| {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap() + Duration::days(days)
    })
}

/// Strategy for a statut paired with an ownership shape it accepts
///
/// Queue states carry no assignee, active states carry exactly one and
/// stuck files keep only the accountable chef.
pub fn statut_ownership_strategy() -> impl Strategy<Value = (Statut, Ownership)> {
    (statut_strategy(), user_id_strategy()).prop_map(|(statut, user)| {
        let ownership = match statut {
            Statut::EnAttente
            | Statut::AScanner
            | Statut::ScanEnCours
            | Statut::Scanne
            | Statut::AAffecter
            | Statut::Rejete => Ownership::unassigned(),
            Statut::Assigne => Ownership::assigned(user),
            Statut::EnCours | Statut::MisEnInstance => Ownership::working(user),
            Statut::EnDifficulte => Ownership::held_by(user),
            Statut::Traite
            | Statut::PretVirement
            | Statut::VirementEnCours
            | Statut::VirementExecute
            | Statut::VirementRejete
            | Statut::Cloture => Ownership::working(user),
        };
        (statut, ownership)
    })
}

/// Strategy for generating complete bordereaux that satisfy the
/// statut and ownership consistency rules
pub fn bordereau_strategy() -> impl Strategy<Value = Bordereau> {
    (
        bordereau_id_strategy(),
        reference_strategy(),
        client_id_strategy(),
        statut_ownership_strategy(),
        priorite_strategy(),
        nombre_bs_strategy(),
        delai_strategy(),
        reception_strategy(),
    )
        .prop_map(
            |(id, reference, client, (statut, ownership), priorite, nombre_bs, delai, received)| {
                BordereauBuilder::new()
                    .with_id(id)
                    .with_reference(&reference)
                    .with_client(client)
                    .with_statut(statut)
                    .with_ownership(ownership)
                    .with_priorite(priorite)
                    .with_nombre_bs(nombre_bs)
                    .with_delai(delai)
                    .received_at(received)
                    .build()
            },
        )
}
