/// A menu action a user can ask for, either by button label or by command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Start,
    Deadlines,
    Calculator,
    Scholarship,
    Gpa,
    Profile,
    Admin,
    ExportUsers,
    Broadcast,
    BroadcastUsers,
    BroadcastGroups,
    Exit,
}

const LABELS: [(Intent, &str); 11] = [
    (Intent::Deadlines, "Deadlines"),
    (Intent::Calculator, "Calculator"),
    (Intent::Profile, "👤Profile"),
    (Intent::Admin, "🔑Admin"),
    (Intent::ExportUsers, "Users"),
    (Intent::Broadcast, "Broadcast"),
    (Intent::BroadcastUsers, "Individual chats"),
    (Intent::BroadcastGroups, "Group chats"),
    (Intent::Gpa, "GPA"),
    (Intent::Scholarship, "Scholarship"),
    (Intent::Exit, "Exit"),
];

impl Intent {
    /// Button label shown in reply keyboards. `Start` has none.
    pub fn label(self) -> &'static str {
        LABELS
            .iter()
            .find(|(intent, _)| *intent == self)
            .map(|(_, label)| *label)
            .unwrap_or("/start")
    }

    pub fn parse(text: &str) -> Option<Intent> {
        let text = text.trim();
        if let Some(command) = text.strip_prefix('/') {
            return parse_command(command);
        }
        let wanted = normalize(text);
        if wanted.is_empty() {
            return None;
        }
        LABELS
            .iter()
            .find(|(_, label)| normalize(label) == wanted)
            .map(|(intent, _)| *intent)
    }

    /// Intents that only the admin chat may use.
    pub fn is_admin_only(self) -> bool {
        matches!(
            self,
            Intent::Admin
                | Intent::ExportUsers
                | Intent::Broadcast
                | Intent::BroadcastUsers
                | Intent::BroadcastGroups
        )
    }
}

fn parse_command(command: &str) -> Option<Intent> {
    // "/deadlines@some_bot extra" -> "deadlines"
    let name = command.split_whitespace().next()?;
    let name = name.split('@').next().unwrap_or(name);
    match name.to_lowercase().as_str() {
        "start" => Some(Intent::Start),
        "deadlines" => Some(Intent::Deadlines),
        _ => None,
    }
}

/// Lowercases, drops emoji and punctuation, collapses whitespace.
fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Inline button payloads on the profile message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    DeleteToken,
    ModifyToken,
    CloseProfile,
}

impl CallbackAction {
    pub fn data(self) -> &'static str {
        match self {
            CallbackAction::DeleteToken => "token_delete",
            CallbackAction::ModifyToken => "token_modify",
            CallbackAction::CloseProfile => "token_exit",
        }
    }

    pub fn parse(data: &str) -> Option<CallbackAction> {
        match data {
            "token_delete" => Some(CallbackAction::DeleteToken),
            "token_modify" => Some(CallbackAction::ModifyToken),
            "token_exit" => Some(CallbackAction::CloseProfile),
            _ => None,
        }
    }
}
