//! In-memory database fixture shared by unit tests.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::db::{
    self, dependency_repo, employee_repo, event_repo, evidence_repo, job_repo, material_repo, task_repo,
};
use crate::models::{
    Employee, EventPayload, EvidenceType, GeoPoint, Job, NewDependency, NewEvidence, NewMaterial, NewTask,
    NewTaskEvent, Task, TaskDependency, TaskEvent, TaskEventType, TaskMaterial, TaskStatus,
};

pub(crate) struct Fixture {
    pub conn: Connection,
    pub now: NaiveDateTime,
    pub crew: Employee,
}

impl Fixture {
    pub fn new() -> Self {
        let conn = db::open_in_memory().unwrap();
        let crew = employee_repo::create_employee(&conn, "Default Crew", Some("foreman")).unwrap();
        let now = NaiveDate::from_ymd_opt(2026, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Self { conn, now, crew }
    }

    pub fn hours(&self, h: i64) -> NaiveDateTime {
        self.now + Duration::hours(h)
    }

    pub fn job(&self, title: &str) -> Job {
        job_repo::create_job(&self.conn, title, self.now).unwrap()
    }

    pub fn employee(&self, name: &str) -> Employee {
        employee_repo::create_employee(&self.conn, name, None).unwrap()
    }

    /// A task with every scored field filled in, planned for the two hours
    /// around `now`.
    pub fn new_task(&self, job: &Job, title: &str) -> NewTask {
        NewTask {
            job_id: job.id.clone(),
            title: title.to_string(),
            description: Some(format!("{title} per drawing")),
            status: Some(TaskStatus::Planned),
            planned_start: Some(self.hours(-1)),
            planned_end: Some(self.hours(1)),
            assigned_employee_id: Some(self.crew.id.clone()),
            gps: Some(GeoPoint { lat: 52.37, lng: 4.89 }),
            location_name: Some("Back garden".to_string()),
            location_type: Some("residential".to_string()),
            expected_outcome: Some("Done to spec".to_string()),
        }
    }

    pub fn insert(&self, task: NewTask) -> Task {
        task_repo::create_task(&self.conn, &task, self.now).unwrap()
    }

    pub fn task(&self, job: &Job, title: &str) -> Task {
        self.insert(self.new_task(job, title))
    }

    pub fn set_status(&self, task: &Task, status: TaskStatus) -> Task {
        task_repo::update_task_status(&self.conn, &task.id, status, self.now).unwrap();
        self.reload(task)
    }

    /// Mark the task completed with actual times matching the plan.
    pub fn complete_on_plan(&self, task: &Task) -> Task {
        task_repo::set_actual_times(&self.conn, &task.id, task.planned_start, task.planned_end).unwrap();
        self.set_status(task, TaskStatus::Completed)
    }

    pub fn reload(&self, task: &Task) -> Task {
        task_repo::get_task_by_id(&self.conn, &task.id).unwrap()
    }

    pub fn dep(&self, predecessor: &Task, successor: &Task) -> TaskDependency {
        self.dep_with(NewDependency::finish_to_start(&predecessor.id, &successor.id))
    }

    pub fn dep_with(&self, dep: NewDependency) -> TaskDependency {
        dependency_repo::add_dependency(&self.conn, &dep, self.now).unwrap()
    }

    pub fn photo(&self, task: &Task, validated: bool, gps: bool) {
        let evidence = NewEvidence {
            task_id: task.id.clone(),
            evidence_type: EvidenceType::Photo,
            file_path: Some("uploads/site.jpg".to_string()),
            note_text: None,
            measurement_value: None,
            gps: gps.then_some(GeoPoint { lat: 52.37, lng: 4.89 }),
            is_validated: validated,
            captured_offline: false,
        };
        evidence_repo::add_evidence(&self.conn, &evidence, self.now).unwrap();
    }

    pub fn note(&self, task: &Task, text: &str) {
        let evidence = NewEvidence {
            task_id: task.id.clone(),
            evidence_type: EvidenceType::Note,
            file_path: None,
            note_text: Some(text.to_string()),
            measurement_value: None,
            gps: None,
            is_validated: false,
            captured_offline: true,
        };
        evidence_repo::add_evidence(&self.conn, &evidence, self.now).unwrap();
    }

    pub fn material(&self, task: &Task, name: &str, planned: f64, actual: f64) -> TaskMaterial {
        let material = NewMaterial {
            task_id: task.id.clone(),
            material_name: name.to_string(),
            unit: Some("kg".to_string()),
            planned_quantity: planned,
            actual_quantity: Some(actual),
            is_substitute: false,
            substitute_notes: None,
            deviation_notes: None,
        };
        material_repo::add_material(&self.conn, &material).unwrap()
    }

    pub fn event_at(
        &self,
        task: &Task,
        event_type: TaskEventType,
        payload: EventPayload,
        at: NaiveDateTime,
    ) -> TaskEvent {
        event_repo::insert_event(
            &self.conn,
            &NewTaskEvent::new(&task.id, event_type, payload),
            &task.job_id,
            at,
        )
        .unwrap()
    }

    pub fn deviation(&self, task: &Task, event_type: TaskEventType, reason: &str) -> TaskEvent {
        let payload = if event_type == TaskEventType::Blocked {
            EventPayload::Blocked {
                reason: reason.to_string(),
                blocking_task_id: None,
            }
        } else {
            EventPayload::Deviation {
                reason: reason.to_string(),
                notes: None,
            }
        };
        self.event_at(task, event_type, payload, self.hours(-24))
    }
}
