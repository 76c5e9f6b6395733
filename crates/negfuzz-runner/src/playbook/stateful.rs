//! Checks that depend on what earlier tests did to the service

use negfuzz_core::http::HttpMethod;
use negfuzz_core::operation::OperationData;
use tracing::debug;

use super::StatefulPlaybook;
use crate::executor::{ExecutionContext, SimpleRequest, execute_simple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatefulCheck {
    /// GET every resource a successful DELETE removed
    DeletedResourcesNotAvailable,
}

impl StatefulCheck {
    #[must_use]
    pub fn applies_to(self, op: &OperationData) -> bool {
        match self {
            Self::DeletedResourcesNotAvailable => {
                op.method == HttpMethod::Get && !op.template_params().is_empty()
            }
        }
    }
}

pub fn run(ctx: &ExecutionContext, op: &OperationData, playbook: &StatefulPlaybook) {
    match playbook.check {
        StatefulCheck::DeletedResourcesNotAvailable => deleted_resources(ctx, op, playbook),
    }
}

/// Take the deletes under `op`'s path template and check each one. Deletes
/// for other templates are left in place for their operations.
fn deleted_resources(ctx: &ExecutionContext, op: &OperationData, playbook: &StatefulPlaybook) {
    let base = ctx.caller().base_url().trim_end_matches('/');
    let ours = ctx
        .global()
        .take_successful_deletes(|url| matches_template(&op.path, relative_path(base, url)));
    for url in ours {
        let path = relative_path(base, &url);
        debug!(url = %url, "checking deleted resource");
        let request = SimpleRequest::new(
            playbook.name,
            format!("{} ({path})", playbook.description),
            playbook.expected.clone(),
        )
        .method(HttpMethod::Get)
        .relative_path(path)
        .payload("{}")
        .replace_ref_data(false);
        execute_simple(ctx, op, &request);
    }
}

/// `url` without the base URL and query string.
fn relative_path<'a>(base: &str, url: &'a str) -> &'a str {
    let relative = url.strip_prefix(base).unwrap_or(url);
    relative.split('?').next().unwrap_or(relative)
}

/// Whether a concrete path fits a `{param}` template segment by segment.
fn matches_template(template: &str, path: &str) -> bool {
    let template: Vec<&str> = template.trim_matches('/').split('/').collect();
    let path: Vec<&str> = path.trim_matches('/').split('/').collect();
    template.len() == path.len()
        && template.iter().zip(&path).all(|(t, p)| {
            (t.starts_with('{') && t.ends_with('}') && !p.is_empty()) || t == p
        })
}
