//! Documents attached to a bordereau
//!
//! Each scanned claim slip is a document with a coarser lifecycle than its
//! parent. The actual number of linked documents, not the declared
//! `nombre_bs`, is what workload and priority math trust.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BordereauId, CoreError, DocumentId, UserId};

use crate::error::WorkflowError;

/// Coarse document lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatut {
    /// Scanned and stored, waiting for processing
    Uploaded,
    /// Being keyed in by a handler
    EnCours,
    /// Processed
    Traite,
    /// Sent back for administrative correction
    RetourAdmin,
}

impl DocumentStatut {
    pub const ALL: [DocumentStatut; 4] = [
        DocumentStatut::Uploaded,
        DocumentStatut::EnCours,
        DocumentStatut::Traite,
        DocumentStatut::RetourAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatut::Uploaded => "UPLOADED",
            DocumentStatut::EnCours => "EN_COURS",
            DocumentStatut::Traite => "TRAITE",
            DocumentStatut::RetourAdmin => "RETOUR_ADMIN",
        }
    }
}

impl std::str::FromStr for DocumentStatut {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentStatut::ALL
            .iter()
            .find(|statut| statut.as_str() == s)
            .copied()
            .ok_or_else(|| CoreError::validation(format!("unknown document statut: {s}")))
    }
}

/// One scanned slip inside a bordereau
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub bordereau_id: BordereauId,
    /// File name as produced by the scan stage
    pub name: String,
    pub statut: DocumentStatut,
    /// Handler working this slip, when split below bordereau level
    pub assigned_to: Option<UserId>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Registers a freshly scanned slip under a live parent
    ///
    /// Document state is meaningful only while the parent is not archived;
    /// attaching under an archived bordereau is refused.
    pub fn upload(
        bordereau_id: BordereauId,
        parent_archived: bool,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, WorkflowError> {
        if parent_archived {
            return Err(WorkflowError::Archived { id: bordereau_id });
        }
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(WorkflowError::validation("document name must not be empty"));
        }
        Ok(Self {
            id: DocumentId::new_v7(),
            bordereau_id,
            name,
            statut: DocumentStatut::Uploaded,
            assigned_to: None,
            uploaded_at: now,
            updated_at: now,
        })
    }

    /// Moves the slip along its coarse lifecycle
    pub fn update_statut(
        &mut self,
        statut: DocumentStatut,
        parent_archived: bool,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if parent_archived {
            return Err(WorkflowError::Archived {
                id: self.bordereau_id,
            });
        }
        self.statut = statut;
        self.updated_at = now;
        Ok(())
    }

    /// Hands the slip to a handler
    pub fn assign(
        &mut self,
        user: UserId,
        parent_archived: bool,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if parent_archived {
            return Err(WorkflowError::Archived {
                id: self.bordereau_id,
            });
        }
        self.assigned_to = Some(user);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_under_live_parent() {
        let doc = Document::upload(BordereauId::new(), false, "bs_0001.pdf", Utc::now()).unwrap();
        assert_eq!(doc.statut, DocumentStatut::Uploaded);
        assert!(doc.assigned_to.is_none());
    }

    #[test]
    fn test_upload_under_archived_parent_is_refused() {
        let err = Document::upload(BordereauId::new(), true, "bs_0001.pdf", Utc::now()).unwrap_err();
        assert!(matches!(err, WorkflowError::Archived { .. }));
    }

    #[test]
    fn test_archived_parent_freezes_documents() {
        let mut doc = Document::upload(BordereauId::new(), false, "bs.pdf", Utc::now()).unwrap();

        assert!(doc.assign(UserId::new(), true, Utc::now()).is_err());
        assert!(doc
            .update_statut(DocumentStatut::EnCours, true, Utc::now())
            .is_err());
        assert_eq!(doc.statut, DocumentStatut::Uploaded);

        assert!(doc
            .update_statut(DocumentStatut::EnCours, false, Utc::now())
            .is_ok());
        assert_eq!(doc.statut, DocumentStatut::EnCours);
    }

    #[test]
    fn test_document_statut_round_trip() {
        for statut in DocumentStatut::ALL {
            let parsed: DocumentStatut = statut.as_str().parse().unwrap();
            assert_eq!(parsed, statut);
        }
    }
}
