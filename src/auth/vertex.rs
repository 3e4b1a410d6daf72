//! URL construction for the Vertex AI (platform) backend.

/// Build the Vertex AI host for a region. `global` has no regional prefix.
fn aiplatform_host(location: &str) -> String {
    if location == "global" {
        "aiplatform.googleapis.com".to_string()
    } else {
        format!("{location}-aiplatform.googleapis.com")
    }
}

/// Full request URL for a Gemini model operation on the platform backend:
/// `https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:{endpoint}`.
///
/// `model` may carry a leading `models/` prefix (as returned by `list_models`); it is
/// stripped before building the path.
pub fn platform_request_url(project: &str, location: &str, model: &str, endpoint: &str) -> String {
    let model = model.strip_prefix("models/").unwrap_or(model);
    format!(
        "https://{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
        aiplatform_host(location),
        project,
        location,
        model,
        endpoint
    )
}

/// Base URL for the direct (API-key) backend.
pub const DIRECT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Full request URL for a Gemini model operation on the direct backend:
/// `{base}/models/{model}:{endpoint}`, where `base` defaults to
/// [`DIRECT_BASE_URL`] but may be overridden (tests point it at a mock server).
pub fn direct_request_url(base: &str, model: &str, endpoint: &str) -> String {
    let model = model.strip_prefix("models/").unwrap_or(model);
    format!("{base}/models/{model}:{endpoint}")
}

/// `models.list` has no model or `:endpoint` suffix.
pub fn direct_list_models_url(base: &str) -> String {
    format!("{base}/models")
}

/// `models.list` on the platform backend, scoped to Google's published models.
pub fn platform_list_models_url(project: &str, location: &str) -> String {
    format!(
        "https://{}/v1/projects/{}/locations/{}/publishers/google/models",
        aiplatform_host(location),
        project,
        location
    )
}
