//! Query parameter types for API handlers.

use autosuite_core::error::CoreError;
use autosuite_core::flow::FlowType;
use autosuite_core::settings::Settings;
use autosuite_core::status::JobStatus;
use serde::Deserialize;

/// `GET /jobs` parameters (`?page=&page_size=&status=&flow_type=`).
#[derive(Debug, Default, Deserialize)]
pub struct JobListParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<String>,
    pub flow_type: Option<String>,
}

/// Resolved paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl JobListParams {
    /// Page defaults to 1; size defaults to `page_size_default` and is
    /// clamped to `1..=page_size_max`.
    pub fn page(&self, settings: &Settings) -> Page {
        let max = settings.page_size_max.max(1);
        Page {
            page: self.page.unwrap_or(1).max(1),
            page_size: self
                .page_size
                .unwrap_or(settings.page_size_default)
                .clamp(1, max),
        }
    }

    pub fn status(&self) -> Result<Option<JobStatus>, CoreError> {
        non_empty(&self.status)
            .map(|raw| {
                raw.to_ascii_uppercase()
                    .parse::<JobStatus>()
                    .map_err(|_| CoreError::Validation(format!("unknown job status '{raw}'")))
            })
            .transpose()
    }

    pub fn flow_type(&self) -> Result<Option<FlowType>, CoreError> {
        non_empty(&self.flow_type)
            .map(|raw| {
                raw.to_ascii_uppercase()
                    .parse::<FlowType>()
                    .map_err(|_| CoreError::UnsupportedFlow(raw.to_string()))
            })
            .transpose()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
