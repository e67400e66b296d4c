use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPricing {
    pub prompt: f64,
    pub completion: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub pricing: ModelPricing,
    pub is_free: bool,
    pub input_modalities: Vec<String>,
    pub output_modalities: Vec<String>,
    pub is_image_capable: bool,
    pub is_video_capable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub project_id: Option<String>,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMeta {
    pub brand: String,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: String,
    pub text: String,
    pub meta: Option<MessageMeta>,
    pub image_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub video_url: Option<String>,
}

impl Message {
    pub fn user(text: String, brand: String, mode: String) -> Self {
        Self {
            role: "user".to_string(),
            text,
            meta: Some(MessageMeta { brand, mode }),
            image_url: None,
            kind: None,
            video_url: None,
        }
    }

    pub fn assistant_text(text: String) -> Self {
        Self {
            role: "assistant".to_string(),
            text,
            meta: None,
            image_url: None,
            kind: None,
            video_url: None,
        }
    }

    pub fn assistant_image(text: String, image_url: String) -> Self {
        Self {
            image_url: Some(image_url),
            ..Self::assistant_text(text)
        }
    }

    pub fn assistant_video(text: String, video_url: String) -> Self {
        Self {
            kind: Some("video".to_string()),
            video_url: Some(video_url),
            ..Self::assistant_text(text)
        }
    }
}

/// The single persisted unit: everything the console knows about projects
/// and chats, replaced wholesale on each save.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub chats: Vec<Chat>,
}

impl ConversationSnapshot {
    /// Removes a project and every chat filed under it. Chats in other
    /// projects and unfiled chats are untouched.
    pub fn remove_project(&mut self, project_id: &str) {
        self.projects.retain(|p| p.id != project_id);
        self.chats
            .retain(|c| c.project_id.as_deref() != Some(project_id));
    }

    /// Integrity check applied before a snapshot is persisted: ids must be
    /// unique and every chat's project reference must resolve.
    pub fn validate(&self) -> Result<(), String> {
        let mut project_ids = std::collections::HashSet::new();
        for project in &self.projects {
            if !project_ids.insert(project.id.as_str()) {
                return Err(format!("duplicate project id: {}", project.id));
            }
        }

        let mut chat_ids = std::collections::HashSet::new();
        for chat in &self.chats {
            if !chat_ids.insert(chat.id.as_str()) {
                return Err(format!("duplicate chat id: {}", chat.id));
            }
            if let Some(pid) = &chat.project_id {
                if !project_ids.contains(pid.as_str()) {
                    return Err(format!(
                        "chat {} references missing project {pid}",
                        chat.id
                    ));
                }
            }
        }

        Ok(())
    }
}

const TITLE_MAX_CHARS: usize = 40;

/// Chat title derived from the first user message, capped at 40 characters.
pub fn derive_chat_title(messages: &[Message]) -> String {
    let Some(first_user) = messages.iter().find(|m| m.role == "user") else {
        return "New chat".to_string();
    };

    let trimmed = first_user.text.trim();
    if trimmed.is_empty() {
        return "New chat".to_string();
    }

    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }

    let capped: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    format!("{capped}…")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub prompt: String,
    pub brand: String,
    pub mode: String,
    pub model_id: Option<String>,
    pub client_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub message: Message,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: String,
}
