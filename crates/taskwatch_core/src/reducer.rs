use crate::{Action, TaskRegistry};

/// Pure reducer: applies an action to the registry.
///
/// Every branch that finds nothing to change hands the registry back
/// untouched, dirty flag included, so repeated poll results with identical
/// data never look like a change to observers.
pub fn reduce(mut registry: TaskRegistry, action: Action) -> TaskRegistry {
    match action {
        Action::Add(task) => {
            if !registry.contains(task.id) {
                registry.insert(task);
            }
        }
        Action::Update(task) => match registry.get(task.id) {
            Some(existing) if *existing != task => registry.insert(task),
            Some(_) | None => {}
        },
        Action::Remove(id) => {
            registry.remove(id);
        }
        // Not registry actions: only the middleware reacts to them.
        Action::Poll(_) | Action::TaskStarted { .. } => {}
    }
    registry
}
