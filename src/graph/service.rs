use std::collections::{BTreeMap, HashSet, VecDeque};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{dependency_repo, task_repo, timestamp};
use crate::error::SiteopsError;
use crate::models::{
    DependencyStatus, DependencyType, NewDependency, TaskDependency, TaskStatus,
};

use super::{find_cycles, kahn_order, would_create_cycle, DependencyGraph};

/// One task reached while walking the graph, with the edge that led to it.
#[derive(Debug, Clone, Serialize)]
pub struct TraversalHit {
    pub task_id: String,
    pub title: String,
    pub status: TaskStatus,
    /// 1 for a direct neighbour.
    pub depth: usize,
    pub dependency_id: String,
    pub dependency_type: DependencyType,
    pub dependency_status: DependencyStatus,
    pub is_critical: bool,
    pub is_hard: bool,
    pub risk_weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockingDependency {
    pub dependency_id: String,
    pub predecessor_id: String,
    pub predecessor_title: String,
    pub predecessor_status: TaskStatus,
    pub dependency_status: DependencyStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartCheck {
    pub task_id: String,
    pub can_start: bool,
    pub blocking_dependencies: Vec<BlockingDependency>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddedDependency {
    pub dependency: TaskDependency,
    /// The new edge closed a loop. It is stored anyway.
    pub creates_cycle: bool,
}

#[derive(Clone, Copy)]
enum Direction {
    Downstream,
    Upstream,
}

/// Graph queries over `task_dependencies`. Nothing is cached: every call
/// reads the current rows.
pub struct DependencyGraphService<'a> {
    conn: &'a Connection,
    now: NaiveDateTime,
}

impl<'a> DependencyGraphService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            now: timestamp::now(),
        }
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Tasks of the job plus every endpoint of its dependency edges.
    pub fn load_graph(&self, job_id: &str) -> Result<DependencyGraph, SiteopsError> {
        let tasks = task_repo::list_tasks_by_job(self.conn, job_id)?;
        let edges = dependency_repo::list_for_job(self.conn, job_id)?
            .into_iter()
            .map(|d| (d.predecessor_id, d.successor_id))
            .collect();
        Ok(DependencyGraph::new(tasks.into_iter().map(|t| t.id), edges))
    }

    /// Predecessor → successors. Tasks without outgoing edges are omitted.
    pub fn build_adjacency_list(&self, job_id: &str) -> Result<BTreeMap<String, Vec<String>>, SiteopsError> {
        let mut adj: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for dep in dependency_repo::list_for_job(self.conn, job_id)? {
            adj.entry(dep.predecessor_id).or_default().push(dep.successor_id);
        }
        Ok(adj)
    }

    pub fn detect_cycles(&self, job_id: &str) -> Result<Vec<Vec<String>>, SiteopsError> {
        let graph = self.load_graph(job_id)?;
        Ok(find_cycles(&graph))
    }

    /// `None` when the job's dependencies contain a cycle.
    pub fn topological_sort(&self, job_id: &str) -> Result<Option<Vec<String>>, SiteopsError> {
        let graph = self.load_graph(job_id)?;
        if !find_cycles(&graph).is_empty() {
            return Ok(None);
        }
        Ok(kahn_order(&graph).filter(|order| order.len() == graph.nodes.len()))
    }

    pub fn get_downstream_tasks(
        &self,
        task_id: &str,
        max_depth: Option<usize>,
    ) -> Result<Vec<TraversalHit>, SiteopsError> {
        self.traverse(task_id, max_depth, Direction::Downstream)
    }

    pub fn get_upstream_tasks(
        &self,
        task_id: &str,
        max_depth: Option<usize>,
    ) -> Result<Vec<TraversalHit>, SiteopsError> {
        self.traverse(task_id, max_depth, Direction::Upstream)
    }

    /// Breadth-first walk; each task is reported once, at the depth it was
    /// first reached.
    fn traverse(
        &self,
        start: &str,
        max_depth: Option<usize>,
        direction: Direction,
    ) -> Result<Vec<TraversalHit>, SiteopsError> {
        let mut visited: HashSet<String> = HashSet::from([start.to_string()]);
        let mut worklist: VecDeque<(String, usize)> = VecDeque::from([(start.to_string(), 0)]);
        let mut hits = Vec::new();

        while let Some((current, depth)) = worklist.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            let edges = match direction {
                Direction::Downstream => dependency_repo::outgoing(self.conn, &current)?,
                Direction::Upstream => dependency_repo::incoming(self.conn, &current)?,
            };
            for edge in edges {
                let neighbour = match direction {
                    Direction::Downstream => &edge.successor_id,
                    Direction::Upstream => &edge.predecessor_id,
                };
                if !visited.insert(neighbour.clone()) {
                    continue;
                }
                let Some(task) = task_repo::find_task(self.conn, neighbour)? else {
                    continue;
                };
                hits.push(TraversalHit {
                    task_id: task.id.clone(),
                    title: task.title,
                    status: task.status,
                    depth: depth + 1,
                    dependency_id: edge.id.clone(),
                    dependency_type: edge.dependency_type,
                    dependency_status: edge.status,
                    is_critical: edge.is_critical,
                    is_hard: edge.is_hard,
                    risk_weight: edge.risk_weight,
                });
                worklist.push_back((task.id, depth + 1));
            }
        }
        Ok(hits)
    }

    /// A task may start once every hard dependency pointing at it is
    /// satisfied. Soft dependencies never block.
    pub fn check_can_start(&self, task_id: &str) -> Result<StartCheck, SiteopsError> {
        let task = task_repo::get_task_by_id(self.conn, task_id)?;
        let mut blocking_dependencies = Vec::new();
        for dep in dependency_repo::incoming(self.conn, &task.id)? {
            if !dep.is_hard || dep.status == DependencyStatus::Satisfied {
                continue;
            }
            let predecessor = task_repo::get_task_by_id(self.conn, &dep.predecessor_id)?;
            blocking_dependencies.push(BlockingDependency {
                dependency_id: dep.id,
                predecessor_id: predecessor.id,
                predecessor_title: predecessor.title,
                predecessor_status: predecessor.status,
                dependency_status: dep.status,
            });
        }
        Ok(StartCheck {
            task_id: task.id,
            can_start: blocking_dependencies.is_empty(),
            blocking_dependencies,
        })
    }

    /// Re-derive a finish-to-start edge's status from its predecessor.
    /// Edges of other types are returned as stored.
    pub fn update_dependency_status(&self, dependency_id: &str) -> Result<TaskDependency, SiteopsError> {
        let dep = dependency_repo::get_dependency(self.conn, dependency_id)?;
        if dep.dependency_type != DependencyType::FinishToStart {
            return Ok(dep);
        }
        let predecessor = task_repo::get_task_by_id(self.conn, &dep.predecessor_id)?;
        let status = match predecessor.status {
            TaskStatus::Completed => DependencyStatus::Satisfied,
            TaskStatus::Failed => DependencyStatus::Violated,
            _ => DependencyStatus::Active,
        };
        if status == dep.status {
            return Ok(dep);
        }

        dependency_repo::update_status(self.conn, &dep.id, status, self.now)?;
        tracing::debug!(
            dependency_id = %dep.id,
            from = dep.status.as_str(),
            to = status.as_str(),
            "dependency status updated"
        );
        dependency_repo::get_dependency(self.conn, &dep.id)
    }

    /// Refresh every edge leaving a task, typically after its status changed.
    pub fn sync_successor_dependencies(&self, task_id: &str) -> Result<Vec<TaskDependency>, SiteopsError> {
        dependency_repo::outgoing(self.conn, task_id)?
            .iter()
            .map(|dep| self.update_dependency_status(&dep.id))
            .collect()
    }

    /// Insert an edge between two tasks of the same job. Cycles are reported
    /// but not refused.
    pub fn add_dependency(&self, dep: &NewDependency) -> Result<AddedDependency, SiteopsError> {
        if dep.predecessor_id == dep.successor_id {
            return Err(SiteopsError::validation("a task cannot depend on itself"));
        }
        if !dep.risk_weight.is_finite() || dep.risk_weight < 0.0 {
            return Err(SiteopsError::validation(format!(
                "risk weight must be a non-negative number, got {}",
                dep.risk_weight
            )));
        }
        let predecessor = task_repo::get_task_by_id(self.conn, &dep.predecessor_id)?;
        let successor = task_repo::get_task_by_id(self.conn, &dep.successor_id)?;
        if predecessor.job_id != successor.job_id {
            return Err(SiteopsError::validation(format!(
                "tasks {} and {} belong to different jobs",
                predecessor.id, successor.id
            )));
        }
        let existing = dependency_repo::incoming(self.conn, &successor.id)?;
        if existing.iter().any(|d| d.predecessor_id == predecessor.id) {
            return Err(SiteopsError::validation(format!(
                "{} already depends on {}",
                successor.id, predecessor.id
            )));
        }

        let graph = self.load_graph(&successor.job_id)?;
        let creates_cycle = would_create_cycle(&graph, &predecessor.id, &successor.id);
        let dependency = dependency_repo::add_dependency(self.conn, dep, self.now)?;
        if creates_cycle {
            tracing::warn!(
                dependency_id = %dependency.id,
                job_id = %successor.job_id,
                "dependency closes a cycle; the job has no valid order until it is removed"
            );
        }
        // A predecessor that already finished satisfies the new edge immediately.
        let dependency = self.update_dependency_status(&dependency.id)?;
        Ok(AddedDependency {
            dependency,
            creates_cycle,
        })
    }
}
