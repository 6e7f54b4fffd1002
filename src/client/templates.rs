//! Rights policy templates

use super::{checked, Client};
use crate::error::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};

const TEMPLATES_PATH: &str = "/my/v2/templates";

/// Protection template published by the tenant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    /// Template identifier
    #[serde(default, rename = "Id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Client {
    /// List the templates available to the authenticated user
    pub fn templates(&self) -> Result<Vec<Template>> {
        let response = self.request(Method::GET, TEMPLATES_PATH).send()?;
        Ok(checked(response)?.json()?)
    }
}
