use common::{Error, Result};
use std::fmt;
use std::str::FromStr;

use crate::schema::Table;

/// One unit of the load DAG. Each task fully replaces exactly one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    LoadTime,
    LoadGeography,
    LoadEntityType,
    LoadTaxpayer,
    LoadFacts,
}

impl Task {
    pub const ALL: [Task; 5] = [
        Task::LoadTime,
        Task::LoadGeography,
        Task::LoadEntityType,
        Task::LoadTaxpayer,
        Task::LoadFacts,
    ];

    /// Tasks with no upstream tables; they may run concurrently.
    pub const INDEPENDENT: [Task; 3] = [Task::LoadTime, Task::LoadGeography, Task::LoadEntityType];

    pub fn name(&self) -> &'static str {
        match self {
            Task::LoadTime => "cargar_dim_tiempo",
            Task::LoadGeography => "cargar_dim_geografia",
            Task::LoadEntityType => "cargar_dim_tipo_ruc",
            Task::LoadTaxpayer => "cargar_dim_contribuyente",
            Task::LoadFacts => "cargar_hechos_autorizaciones",
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Task::LoadTime => Table::Time,
            Task::LoadGeography => Table::Geography,
            Task::LoadEntityType => Table::EntityType,
            Task::LoadTaxpayer => Table::Taxpayer,
            Task::LoadFacts => Table::AuthorizationFacts,
        }
    }

    /// Tables that must already be in the warehouse before the task runs.
    pub fn dependencies(&self) -> &'static [Table] {
        match self {
            Task::LoadTime | Task::LoadGeography | Task::LoadEntityType => &[],
            Task::LoadTaxpayer => &[Table::Geography, Table::EntityType],
            Task::LoadFacts => &[Table::Time, Table::Taxpayer],
        }
    }

    /// The task that loads `table`.
    pub fn loading(table: Table) -> Task {
        match table {
            Table::Time => Task::LoadTime,
            Table::Geography => Task::LoadGeography,
            Table::EntityType => Task::LoadEntityType,
            Table::Taxpayer => Task::LoadTaxpayer,
            Table::AuthorizationFacts => Task::LoadFacts,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Task {
    type Err = Error;

    /// Accepts the task name or the name of the table it loads.
    fn from_str(s: &str) -> Result<Self> {
        Task::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .or_else(|| Table::from_name(s).map(Task::loading))
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "unknown task '{}', expected one of: {}",
                    s,
                    Task::ALL.map(|t| t.name()).join(", ")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_point_upstream() {
        let position = |t: Task| Task::ALL.iter().position(|x| *x == t).unwrap();
        for task in Task::ALL {
            for table in task.dependencies() {
                let producer = Task::loading(*table);
                assert_eq!(producer.table(), *table);
                assert!(position(producer) < position(task), "{task} depends on later {table}");
            }
        }
        assert!(Task::INDEPENDENT.iter().all(|t| t.dependencies().is_empty()));
    }

    #[test]
    fn parses_task_and_table_names() {
        assert_eq!("cargar_dim_tiempo".parse::<Task>().unwrap(), Task::LoadTime);
        assert_eq!("hechos_autorizaciones".parse::<Task>().unwrap(), Task::LoadFacts);
        assert_eq!(" dim_tipo_ruc".parse::<Task>().ok(), None);
        for task in Task::ALL {
            assert_eq!(task.table().name().parse::<Task>().unwrap(), task);
        }
        assert!("cargar_todo".parse::<Task>().is_err());
    }
}
