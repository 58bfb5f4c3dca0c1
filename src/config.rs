use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::util::{is_local_endpoint_url, join_url};

pub const DEFAULT_API_URL: &str = "http://localhost:5002";
pub const DEFAULT_ACCOUNT_INTEL_PATH: &str = "/api/accounts/intel";
pub const DEFAULT_CRM_WORKFLOW_PATH: &str = "/api/crm/workflow";

const API_URL_ENV: &str = "CRMSTREAM_API_URL";
const AUTH_TOKEN_ENV: &str = "CRMSTREAM_AUTH_TOKEN";
const ACCOUNT_INTEL_PATH_ENV: &str = "CRMSTREAM_ACCOUNT_INTEL_PATH";
const CRM_WORKFLOW_PATH_ENV: &str = "CRMSTREAM_CRM_WORKFLOW_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub account_intel_path: String,
    pub crm_workflow_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_base_url(DEFAULT_API_URL)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = non_blank_env(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let auth_token = non_blank_env(AUTH_TOKEN_ENV);
        let account_intel_path = non_blank_env(ACCOUNT_INTEL_PATH_ENV)
            .unwrap_or_else(|| DEFAULT_ACCOUNT_INTEL_PATH.to_string());
        let crm_workflow_path = non_blank_env(CRM_WORKFLOW_PATH_ENV)
            .unwrap_or_else(|| DEFAULT_CRM_WORKFLOW_PATH.to_string());

        Ok(Self {
            api_url,
            auth_token,
            account_intel_path,
            crm_workflow_path,
        })
    }

    /// Default endpoint paths against the given backend.
    pub fn for_base_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            auth_token: None,
            account_intel_path: DEFAULT_ACCOUNT_INTEL_PATH.to_string(),
            crm_workflow_path: DEFAULT_CRM_WORKFLOW_PATH.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let api_url = self.api_url.trim();
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            bail!(
                "Invalid {API_URL_ENV} '{}': expected http:// or https:// URL",
                self.api_url
            );
        }
        if reqwest::Url::parse(api_url).is_err() {
            bail!("Invalid {API_URL_ENV} '{}': not a valid URL", self.api_url);
        }

        for (name, path) in [
            (ACCOUNT_INTEL_PATH_ENV, &self.account_intel_path),
            (CRM_WORKFLOW_PATH_ENV, &self.crm_workflow_path),
        ] {
            if !path.starts_with('/') {
                bail!("Invalid {name} '{path}': endpoint paths must start with '/'");
            }
        }

        if self.auth_token.is_some()
            && api_url.starts_with("http://")
            && !is_local_endpoint_url(api_url)
        {
            bail!(
                "Refusing to send {AUTH_TOKEN_ENV} over plain http to non-local endpoint '{}'",
                self.api_url
            );
        }

        Ok(())
    }

    pub fn endpoint_url(&self, path: &str) -> String {
        join_url(&self.api_url, path)
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
