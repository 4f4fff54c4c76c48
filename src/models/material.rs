use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMaterial {
    pub id: String,
    pub task_id: String,
    pub material_name: String,
    pub unit: Option<String>,
    pub planned_quantity: f64,
    pub actual_quantity: Option<f64>,
    pub is_substitute: bool,
    pub substitute_notes: Option<String>,
    pub deviation_notes: Option<String>,
}

impl TaskMaterial {
    /// Relative deviation of actual from planned quantity, if both are usable.
    pub fn deviation_ratio(&self) -> Option<f64> {
        let actual = self.actual_quantity?;
        if self.planned_quantity <= 0.0 {
            return None;
        }
        Some((actual - self.planned_quantity).abs() / self.planned_quantity)
    }

    pub fn deviates(&self) -> bool {
        self.deviation_ratio().is_some_and(|r| r > 0.10)
    }
}

#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub task_id: String,
    pub material_name: String,
    pub unit: Option<String>,
    pub planned_quantity: f64,
    pub actual_quantity: Option<f64>,
    pub is_substitute: bool,
    pub substitute_notes: Option<String>,
    pub deviation_notes: Option<String>,
}
