use anyhow::Result;
use std::path::Path;

use super::{BoardRepository, JsonCollection};
use crate::domain::board::Board;
use crate::domain::{DomainError, DomainResult};

pub struct JsonBoardRepository {
    boards: JsonCollection<Board>,
}

impl JsonBoardRepository {
    pub fn open(data_dir: &Path) -> Result<Self> {
        Ok(Self {
            boards: JsonCollection::open(data_dir.join("boards.json"))?,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            boards: JsonCollection::in_memory(),
        }
    }
}

impl BoardRepository for JsonBoardRepository {
    fn save(&self, board: &Board) -> DomainResult<()> {
        self.boards.upsert(&board.id, board.clone())
    }

    fn find_by_id(&self, id: &str) -> DomainResult<Board> {
        self.boards
            .get(id)
            .ok_or_else(|| DomainError::BoardNotFound(id.to_string()))
    }

    fn exists(&self, id: &str) -> bool {
        self.boards.contains(id)
    }

    fn list(&self) -> DomainResult<Vec<Board>> {
        Ok(self.boards.values())
    }

    fn list_by_project(&self, project_id: &str) -> DomainResult<Vec<Board>> {
        Ok(self.boards.filter(|b| b.project_id == project_id))
    }

    fn delete(&self, id: &str) -> DomainResult<()> {
        self.boards
            .remove(id)?
            .map(|_| ())
            .ok_or_else(|| DomainError::BoardNotFound(id.to_string()))
    }
}
