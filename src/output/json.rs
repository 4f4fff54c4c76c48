use serde::Serialize;
use serde_json::{json, Value};

use crate::error::SiteopsError;
use crate::models::{Task, TaskDependency};

pub fn success(data: Value) -> Value {
    json!({
        "success": true,
        "data": data
    })
}

pub fn error(err: &SiteopsError) -> Value {
    json!({
        "success": false,
        "error": {
            "code": err.code.as_str(),
            "message": err.message
        }
    })
}

pub fn print(value: &Value) -> Result<(), SiteopsError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Serialize any report type for the `data` field.
pub fn to_data<T: Serialize>(value: &T) -> Result<Value, SiteopsError> {
    Ok(serde_json::to_value(value)?)
}

pub fn task_summary(t: &Task) -> Value {
    let mut v = json!({
        "id": t.id,
        "job_id": t.job_id,
        "title": t.title,
        "status": t.status.as_str(),
        "integrity_score": t.integrity_score
    });
    if let Some(ref employee) = t.assigned_employee_id {
        v["assigned_employee_id"] = json!(employee);
    }
    v
}

pub fn dependency_summary(d: &TaskDependency) -> Value {
    json!({
        "id": d.id,
        "predecessor_id": d.predecessor_id,
        "successor_id": d.successor_id,
        "type": d.dependency_type.as_str(),
        "status": d.status.as_str(),
        "is_hard": d.is_hard,
        "is_critical": d.is_critical,
        "risk_weight": d.risk_weight,
        "risk_level": d.current_risk_level.as_str()
    })
}
