use serde::{Deserialize, Serialize};
use suscridash_types::BusinessStatus;

/// A subscription-selling business, as last returned by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: String,
    pub legal_name: String,
    pub contact_email: String,
    pub tax_id: String,
    pub status: BusinessStatus,
    /// Derived by the service; never composed locally
    #[serde(default)]
    pub subscriber_count: i64,
}

/// Admin registration of a business.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBusiness {
    pub legal_name: String,
    pub contact_email: String,
    pub tax_id: String,
    /// Left to the service default (`pending`) when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BusinessStatus>,
}

/// Partial edit of a business; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BusinessStatus>,
}

impl BusinessChanges {
    pub fn is_empty(&self) -> bool {
        self.legal_name.is_none()
            && self.contact_email.is_none()
            && self.tax_id.is_none()
            && self.status.is_none()
    }
}
