use super::intent::{CallbackAction, Intent};
use crate::telegram::ReplyMarkup;
use crate::telegram::keyboards::{inline_keyboard, reply_keyboard};

fn labels<const N: usize>(intents: [Intent; N]) -> Vec<&'static str> {
    intents.into_iter().map(Intent::label).collect()
}

pub fn main_menu(is_admin: bool) -> ReplyMarkup {
    let mut rows = vec![
        labels([Intent::Deadlines, Intent::Calculator]),
        labels([Intent::Profile]),
    ];
    if is_admin {
        rows.push(labels([Intent::Admin]));
    }
    reply_keyboard(rows)
}

pub fn admin_menu() -> ReplyMarkup {
    reply_keyboard([
        labels([Intent::ExportUsers, Intent::Broadcast]),
        labels([Intent::Exit]),
    ])
}

pub fn broadcast_menu() -> ReplyMarkup {
    reply_keyboard([
        labels([Intent::BroadcastUsers, Intent::BroadcastGroups]),
        labels([Intent::Exit]),
    ])
}

pub fn calculator_menu() -> ReplyMarkup {
    reply_keyboard([
        labels([Intent::Gpa, Intent::Scholarship]),
        labels([Intent::Exit]),
    ])
}

/// Shown while a multi-step input is pending.
pub fn exit_menu() -> ReplyMarkup {
    reply_keyboard([labels([Intent::Exit])])
}

pub fn profile_keyboard() -> ReplyMarkup {
    inline_keyboard([
        vec![
            ("Delete", CallbackAction::DeleteToken.data()),
            ("Modify", CallbackAction::ModifyToken.data()),
        ],
        vec![("Exit", CallbackAction::CloseProfile.data())],
    ])
}
