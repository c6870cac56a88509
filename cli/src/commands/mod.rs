mod backup;
mod draft;
mod helpers;
mod photo;
mod recipe;

pub(crate) use backup::{cmd_export, cmd_import};
pub(crate) use draft::{cmd_draft_clear, cmd_draft_set, cmd_draft_show};
pub(crate) use photo::cmd_photo;
pub(crate) use recipe::{cmd_add, cmd_clear, cmd_delete, cmd_edit, cmd_list, cmd_show};
