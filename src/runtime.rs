use crate::webhook::{WebhookClient, WebhookError};
use crate::widget::{FieldSpec, FormData, WidgetConfig};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

pub const SUBMIT_FAILED_ALERT: &str = "Failed to submit form. Please try again.";
pub const SUBMITTED_HEADLINE: &str = "Your referral has been submitted!";
const SUBMITTED_BODY: &str = "Thank you for your referral. We appreciate your support!";
const BRANDING_HREF: &str = "https://joinclicki.com/?widget";
const BRANDING_IMG: &str =
    "https://clicki-unlayer-uploads.s3.us-east-1.amazonaws.com/1712037184377-Group+46923.png";
const VIDEO_ALLOW: &str =
    "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("popup already submitted")]
    AlreadySubmitted,
    #[error("a submission is already in flight")]
    InFlight,
    #[error("required field `{0}` is empty")]
    MissingField(String),
    #[error("field `{0}` is not part of this form")]
    UnknownField(String),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

impl SubmitError {
    /// Text shown to the user in a blocking alert, if any.
    pub fn alert(&self) -> Option<&'static str> {
        match self {
            SubmitError::Webhook(_) => Some(SUBMIT_FAILED_ALERT),
            _ => None,
        }
    }
}

/// Decorative icon chosen from a field's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    User,
    Phone,
    Mail,
    Building,
}

const ICONS: &[(&str, Icon)] = &[
    ("name", Icon::User),
    ("phone", Icon::Phone),
    ("email", Icon::Mail),
    ("business", Icon::Building),
];

impl Icon {
    pub fn for_field(name: &str) -> Option<Icon> {
        ICONS
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, icon)| *icon)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Icon::User => "user",
            Icon::Phone => "phone",
            Icon::Mail => "mail",
            Icon::Building => "building",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupPhase {
    Filling,
    Submitted,
}

/// Floating toggle plus, while open, one popup.
#[derive(Debug)]
pub struct Widget {
    config: Arc<WidgetConfig>,
    popup: Option<Popup>,
}

impl Widget {
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            config: Arc::new(config),
            popup: None,
        }
    }

    pub fn state(&self) -> WidgetState {
        if self.popup.is_some() {
            WidgetState::Open
        } else {
            WidgetState::Closed
        }
    }

    #[allow(dead_code)]
    pub fn toggle(&mut self) -> WidgetState {
        match self.state() {
            WidgetState::Closed => self.open(),
            WidgetState::Open => self.close(),
        }
        self.state()
    }

    /// Opens a fresh popup; a no-op when already open.
    pub fn open(&mut self) {
        if self.popup.is_none() {
            let popup = Popup::new(self.config.clone());
            info!(popup = %popup.id, "widget opened");
            self.popup = Some(popup);
        }
    }

    /// Drops the popup and whatever was typed into it.
    pub fn close(&mut self) {
        if let Some(popup) = self.popup.take() {
            info!(popup = %popup.id, phase = ?popup.phase, "widget closed");
        }
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn popup_mut(&mut self) -> Option<&mut Popup> {
        self.popup.as_mut()
    }

    pub fn render(&self) -> String {
        let mut html = String::new();
        let pulse = if self.popup.is_none() {
            " clicki-pulse"
        } else {
            ""
        };
        let _ = write!(
            html,
            r#"<button type="button" class="clicki-toggle{pulse}" style="background-color: {color}" aria-label="Open widget" data-clicki-action="toggle"><span class="clicki-icon" data-icon="gift" aria-hidden="true"></span></button>"#,
            color = escape_html(&self.config.widget_color),
        );
        if let Some(popup) = &self.popup {
            html.push_str(&popup.render());
        }
        html
    }
}

/// Outgoing request captured when a submission starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub url: String,
    pub data: FormData,
}

#[derive(Debug)]
pub struct Popup {
    id: Uuid,
    config: Arc<WidgetConfig>,
    data: FormData,
    phase: PopupPhase,
    in_flight: bool,
}

impl Popup {
    fn new(config: Arc<WidgetConfig>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            data: FormData::new(),
            phase: PopupPhase::Filling,
            in_flight: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    #[allow(dead_code)]
    pub fn phase(&self) -> PopupPhase {
        self.phase
    }

    #[allow(dead_code)]
    pub fn form_data(&self) -> &FormData {
        &self.data
    }

    #[allow(dead_code)]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Records a keystroke-level update for a rendered field.
    pub fn input(&mut self, name: &str, value: impl Into<String>) -> Result<(), SubmitError> {
        if self.phase == PopupPhase::Submitted {
            return Err(SubmitError::AlreadySubmitted);
        }
        if self.config.field(name).is_none() {
            return Err(SubmitError::UnknownField(name.to_string()));
        }
        self.data.set(name, value);
        Ok(())
    }

    /// Checks `required` on every field and marks the popup as busy.
    pub fn begin_submit(&mut self) -> Result<PendingSubmission, SubmitError> {
        if self.phase == PopupPhase::Submitted {
            return Err(SubmitError::AlreadySubmitted);
        }
        if self.in_flight {
            return Err(SubmitError::InFlight);
        }
        if let Some(missing) = self
            .config
            .form_fields
            .iter()
            .find(|f| self.data.get(&f.name).is_none_or(str::is_empty))
        {
            return Err(SubmitError::MissingField(missing.name.clone()));
        }
        self.in_flight = true;
        Ok(PendingSubmission {
            url: self.config.webhook_url.clone(),
            data: self.data.clone(),
        })
    }

    /// Applies the webhook outcome. Success discards the form data; failures
    /// leave it in place.
    pub fn finish_submit(&mut self, outcome: Result<(), WebhookError>) -> Result<(), SubmitError> {
        self.in_flight = false;
        match outcome {
            Ok(()) => {
                info!(popup = %self.id, "referral submitted");
                self.phase = PopupPhase::Submitted;
                self.data = FormData::new();
                Ok(())
            }
            Err(err) => {
                error!(popup = %self.id, %err, "error submitting form");
                Err(SubmitError::Webhook(err))
            }
        }
    }

    pub async fn submit(&mut self, client: &dyn WebhookClient) -> Result<(), SubmitError> {
        let pending = self.begin_submit()?;
        let outcome = client.post_form(&pending.url, &pending.data).await;
        self.finish_submit(outcome)
    }

    pub fn render(&self) -> String {
        let submitted = self.phase == PopupPhase::Submitted;
        let state = if submitted { "submitted" } else { "filling" };
        let title = if submitted {
            "Thank You!"
        } else {
            self.config.header_text.as_str()
        };
        let mut html = String::new();
        let _ = write!(
            html,
            r#"<div class="clicki-popup" data-clicki-popup="{id}" data-state="{state}"><div class="clicki-popup-header"><h2>{title}</h2><button type="button" class="clicki-close" aria-label="Close" data-clicki-action="close">&times;</button></div><div class="clicki-popup-body">"#,
            id = self.id,
            title = escape_html(title),
        );
        if submitted {
            let _ = write!(
                html,
                r#"<div class="clicki-thanks"><h3>{SUBMITTED_HEADLINE}</h3><p>{SUBMITTED_BODY}</p></div>"#
            );
        } else {
            self.render_filling(&mut html);
        }
        html.push_str("</div>");
        if !submitted {
            let disabled = if self.in_flight { " disabled" } else { "" };
            let _ = write!(
                html,
                r#"<div class="clicki-popup-footer"><button type="submit" form="clicki-form-{id}" class="clicki-submit" style="background-color: {color}"{disabled}>Send Referral</button></div>"#,
                id = self.id,
                color = escape_html(&self.config.button_color),
            );
        }
        let _ = write!(
            html,
            r#"<div class="clicki-branding"><a href="{BRANDING_HREF}" target="_blank" rel="noopener noreferrer"><img src="{BRANDING_IMG}" alt="Get more referrals with Clicki"></a></div></div>"#
        );
        html
    }

    fn render_filling(&self, html: &mut String) {
        if self.config.has_video() {
            let _ = write!(
                html,
                r#"<div class="clicki-video"><iframe width="100%" height="200" src="{src}" title="Embedded video" frameborder="0" allow="{VIDEO_ALLOW}" allowfullscreen></iframe></div>"#,
                src = escape_html(&self.config.video_url),
            );
        }
        if self.config.has_rewards() {
            let _ = write!(
                html,
                r#"<div class="clicki-rewards"><h3><span class="clicki-icon" data-icon="dollar" aria-hidden="true"></span>Earn rewards!</h3><p>{text}</p></div>"#,
                text = escape_html(&self.config.rewards_text),
            );
        }
        let _ = write!(
            html,
            r#"<form class="clicki-form" id="clicki-form-{id}">"#,
            id = self.id
        );
        for field in &self.config.form_fields {
            self.render_field(html, field);
        }
        html.push_str("</form>");
    }

    fn render_field(&self, html: &mut String, field: &FieldSpec) {
        let name = escape_html(&field.name);
        let icon = Icon::for_field(&field.name)
            .map(|icon| {
                format!(
                    r#"<span class="clicki-icon" data-icon="{}" aria-hidden="true"></span>"#,
                    icon.as_str()
                )
            })
            .unwrap_or_default();
        let value = self
            .data
            .get(&field.name)
            .map(|v| format!(r#" value="{}""#, escape_html(v)))
            .unwrap_or_default();
        let _ = write!(
            html,
            r#"<div class="clicki-field"><label for="{name}">{label}</label><div class="clicki-input">{icon}<input type="{kind}" id="{name}" name="{name}"{value} placeholder="Enter {placeholder}" required></div></div>"#,
            label = escape_html(&field.label),
            kind = field.kind.as_str(),
            placeholder = escape_html(&field.label.to_lowercase()),
        );
    }
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
