// TaskMutator backed by the board service

use crate::domain::action_type::TaskMutator;
use crate::domain::board::Task;
use crate::domain::task_id::TaskId;
use crate::domain::DomainResult;
use crate::usecase::boards::BoardService;

/// Writes made by actions. Uses a service without an event bus so an
/// action's own effects never re-enter the automation pipeline.
pub struct BoardTaskMutator {
    boards: BoardService,
}

impl BoardTaskMutator {
    pub fn new(boards: &BoardService) -> Self {
        Self {
            boards: boards.without_events(),
        }
    }
}

impl TaskMutator for BoardTaskMutator {
    fn update_task(&self, board_id: &str, task: &Task) -> DomainResult<()> {
        self.boards.replace_task(board_id, task).map(|_| ())
    }

    fn move_task(&self, board_id: &str, task_id: &TaskId, column_name: &str) -> DomainResult<()> {
        self.boards
            .move_task(board_id, &task_id.to_string(), column_name)
            .map(|_| ())
    }

    fn create_task(&self, board_id: &str, column_name: &str, task: Task) -> DomainResult<()> {
        self.boards.insert_task(board_id, column_name, task).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{DomainEvent, EventBus, EventHandler, SubscriptionId};
    use crate::domain::values::{EventType, Priority, Status};
    use crate::store::JsonBoardRepository;
    use crate::usecase::boards::default_columns;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CountingBus(Mutex<usize>);

    impl EventBus for CountingBus {
        fn publish(&self, _: DomainEvent) {
            *self.0.lock().unwrap() += 1;
        }
        fn subscribe(&self, _: EventType, _: Arc<dyn EventHandler>) -> SubscriptionId {
            SubscriptionId(uuid::Uuid::new_v4())
        }
        fn subscribe_all(&self, _: Arc<dyn EventHandler>) -> SubscriptionId {
            SubscriptionId(uuid::Uuid::new_v4())
        }
        fn unsubscribe(&self, _: SubscriptionId) -> bool {
            false
        }
    }

    #[test]
    fn test_mutations_are_silent() {
        let bus = Arc::new(CountingBus::default());
        let service = BoardService::new(Arc::new(JsonBoardRepository::in_memory()), Some(bus.clone()));
        let mut board = service
            .create_board_with_columns("p", "Work", "", default_columns())
            .unwrap();
        let published = *bus.0.lock().unwrap();
        let mutator = BoardTaskMutator::new(&service);

        let id = board.generate_next_task_id("Drafted").unwrap();
        let task = Task::new(id.clone(), "Drafted", "", Priority::Low, Status::Todo).unwrap();
        mutator.create_task(&board.id, "To Do", task).unwrap();
        mutator.move_task(&board.id, &id, "Done").unwrap();

        let stored = service.get_board(&board.id).unwrap();
        let (task, column) = stored.find_task(&id).unwrap();
        assert_eq!(column.name, "Done");
        let mut edited = task.clone();
        edited.update_priority(Priority::High);
        mutator.update_task(&board.id, &edited).unwrap();

        assert_eq!(service.get_board(&board.id).unwrap().find_task(&id).unwrap().0.priority, Priority::High);
        assert_eq!(*bus.0.lock().unwrap(), published);
    }
}
