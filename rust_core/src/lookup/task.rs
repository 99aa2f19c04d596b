use tracing::{debug, info};

use super::{Lookup, LookupOutcome};
use crate::directory::EntityDirectory;
use crate::disambiguation::ReplyChannel;
use crate::error::LookupError;
use crate::identity::IdentityMap;
use crate::models::{NamedEntity, TaskTarget};

/// What a "create task" command asked for, already parsed.
#[derive(Debug, Clone, Default)]
pub struct TaskRequest {
    pub requester_id: String,
    pub requester_username: Option<String>,
    pub board_query: String,
    /// Whose list the task goes on. `None` means the default list.
    pub person: Option<String>,
    pub mentioned_usernames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskTargetResult {
    Ready(TaskTarget),
    BoardUnresolved(LookupOutcome),
    ListUnresolved {
        board: NamedEntity,
        outcome: LookupOutcome,
    },
}

impl<'a, D: EntityDirectory + ?Sized> Lookup<'a, D> {
    /// Board, list and assignees for a new task.
    ///
    /// Assignees are the creator, the owner of the chosen list and every
    /// mentioned user, in that order and without duplicates. Members that
    /// cannot be found are left out.
    pub async fn task_target<C>(
        &self,
        request: &TaskRequest,
        identity: &IdentityMap,
        channel: &mut C,
    ) -> Result<TaskTargetResult, LookupError>
    where
        C: ReplyChannel + ?Sized,
    {
        let board = match self
            .board(&request.board_query, &request.requester_id, channel)
            .await?
        {
            LookupOutcome::Resolved(board) => board,
            outcome => return Ok(TaskTargetResult::BoardUnresolved(outcome)),
        };

        let person = request
            .person
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(self.settings.list_fallback.default_list.as_str());
        let resolution = self
            .list(&board.id, person, &request.requester_id, channel)
            .await?;
        let list = match resolution.outcome {
            LookupOutcome::Resolved(list) => list,
            outcome => return Ok(TaskTargetResult::ListUnresolved { board, outcome }),
        };

        let mut member_ids: Vec<String> = Vec::new();
        let mut add = |member: Option<NamedEntity>| {
            if let Some(member) = member {
                if !member_ids.contains(&member.id) {
                    member_ids.push(member.id);
                }
            }
        };

        if let Some(username) = &request.requester_username {
            add(self.member_for_chat_user(username, identity).await?);
        }

        if !resolution.used_default_list {
            let owner = self
                .member_for_list(&list.raw_name, &request.requester_id, channel)
                .await?;
            add(owner.entity().cloned());
        }

        for username in &request.mentioned_usernames {
            add(self.member_for_chat_user(username, identity).await?);
        }

        info!(
            "Task target: board {:?}, list {:?}, {} members",
            board.raw_name,
            list.raw_name,
            member_ids.len()
        );
        debug!("Task members: {:?}", member_ids);

        Ok(TaskTargetResult::Ready(TaskTarget {
            board,
            list,
            used_default_list: resolution.used_default_list,
            member_ids,
        }))
    }
}
