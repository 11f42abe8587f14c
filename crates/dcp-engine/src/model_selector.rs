//! Model selection for the background analyser.
//!
//! Candidates in priority order: the configured override, the cached
//! params from the session's last chat request, then the model on the
//! session record. Candidates failing the capability check fall through
//! unless strict selection is on; fallbacks optionally surface a toast.

use tracing::{info, warn};

use dcp_host::{HostApi, Toast, ToastLevel};
use dcp_settings::DcpSettings;

use crate::state::{ModelRef, SessionState};

/// Parse a `provider/model` string.
#[must_use]
pub fn parse_model_ref(raw: &str) -> Option<ModelRef> {
    let (provider, model) = raw.split_once('/')?;
    if provider.is_empty() || model.is_empty() {
        return None;
    }
    Some(ModelRef {
        provider_id: provider.to_owned(),
        model_id: model.to_owned(),
    })
}

/// Default capability check for background analysis.
///
/// Analysis runs need a chat-capable model; embedding, transcription,
/// reranking, and image model ids are rejected.
#[must_use]
pub fn is_analysis_capable(model: &ModelRef) -> bool {
    let id = model.model_id.to_ascii_lowercase();
    !["embed", "whisper", "transcribe", "rerank", "tts", "image", "dall-e"]
        .iter()
        .any(|marker| id.contains(marker))
}

/// Where a selected model came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelSource {
    /// The `model.analysisModel` config override.
    ConfigOverride,
    /// Cached params from the last chat request.
    ChatParams,
    /// The session record's model.
    SessionInfo,
}

/// A selected model and its provenance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedModel {
    /// The chosen model.
    pub model: ModelRef,
    /// Which candidate slot it came from.
    pub source: ModelSource,
}

/// Pick a model for background analysis.
///
/// `is_capable` is the capability check (tool use, context size — whatever
/// the analysis needs). Returns `None` when no candidate passes, or when
/// strict selection is on and the first candidate fails.
pub async fn select_model<F>(
    settings: &DcpSettings,
    state: &SessionState,
    session_model: Option<&str>,
    is_capable: F,
    host: &dyn HostApi,
) -> Option<SelectedModel>
where
    F: Fn(&ModelRef) -> bool,
{
    let candidates: Vec<(ModelSource, ModelRef)> = [
        (
            ModelSource::ConfigOverride,
            settings.model.analysis_model.as_deref().and_then(parse_model_ref),
        ),
        (ModelSource::ChatParams, state.last_chat_params.clone()),
        (
            ModelSource::SessionInfo,
            session_model.and_then(parse_model_ref),
        ),
    ]
    .into_iter()
    .filter_map(|(source, model)| model.map(|m| (source, m)))
    .collect();

    for (index, (source, model)) in candidates.iter().enumerate() {
        if is_capable(model) {
            if index > 0 {
                info!(
                    provider = %model.provider_id,
                    model = %model.model_id,
                    "analysis model selection fell back"
                );
                if settings.model.show_model_error_toasts {
                    let toast = Toast {
                        title: Some("DCP".to_owned()),
                        message: format!(
                            "Analysis model fell back to {}/{}",
                            model.provider_id, model.model_id
                        ),
                        level: ToastLevel::Warning,
                    };
                    let _ = host.show_toast(toast).await;
                }
            }
            return Some(SelectedModel {
                model: model.clone(),
                source: *source,
            });
        }

        warn!(
            provider = %model.provider_id,
            model = %model.model_id,
            "analysis model failed capability check"
        );
        if settings.model.strict_model_selection {
            return None;
        }
    }

    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
