pub mod board;
pub mod card;
pub mod card_comment;
pub mod checklist_item;
pub mod edit_session;
pub mod team;
pub mod team_member;
