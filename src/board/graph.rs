use std::collections::{HashMap, HashSet};

use super::task::{Task, TaskId};

/// Cycles found in the board's dependency graph. Any member is skipped
/// permanently for the rest of the run.
#[derive(Debug, Default, Clone)]
pub struct CycleReport {
    pub self_loops: Vec<TaskId>,
    pub components: Vec<Vec<TaskId>>,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        self.self_loops.is_empty() && self.components.is_empty()
    }

    pub fn cyclic_ids(&self) -> HashSet<TaskId> {
        self.self_loops
            .iter()
            .cloned()
            .chain(self.components.iter().flatten().cloned())
            .collect()
    }
}

/// Detects dependency cycles: self-loops and strongly-connected components
/// of size two or more (Tarjan). Edges to identifiers not on the board are
/// ignored here; they are reported separately by dependency validation.
pub fn detect_cycles(tasks: &[Task]) -> CycleReport {
    let ids: HashSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();
    let graph: HashMap<&TaskId, Vec<&TaskId>> = tasks
        .iter()
        .map(|t| {
            let deps: Vec<&TaskId> = t
                .dependencies
                .iter()
                .filter(|d| ids.contains(d))
                .collect();
            (&t.id, deps)
        })
        .collect();

    let mut report = CycleReport::default();

    for task in tasks {
        if task.dependencies.contains(&task.id) {
            report.self_loops.push(task.id.clone());
        }
    }

    let mut tarjan = Tarjan::new(&graph);
    let roots: Vec<TaskId> = graph.keys().map(|k| (*k).clone()).collect();
    for node in roots {
        if !tarjan.index.contains_key(&node) {
            tarjan.strong_connect(&node);
        }
    }

    for component in tarjan.components {
        if component.len() > 1 {
            let mut sorted = component;
            sorted.sort();
            report.components.push(sorted);
        }
    }
    report.components.sort();
    report.self_loops.sort();

    report
}

struct Tarjan<'a> {
    graph: &'a HashMap<&'a TaskId, Vec<&'a TaskId>>,
    index: HashMap<TaskId, usize>,
    lowlink: HashMap<TaskId, usize>,
    on_stack: HashSet<TaskId>,
    stack: Vec<TaskId>,
    next_index: usize,
    components: Vec<Vec<TaskId>>,
}

impl<'a> Tarjan<'a> {
    fn new(graph: &'a HashMap<&'a TaskId, Vec<&'a TaskId>>) -> Self {
        Self {
            graph,
            index: HashMap::new(),
            lowlink: HashMap::new(),
            on_stack: HashSet::new(),
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        }
    }

    fn strong_connect(&mut self, node: &TaskId) {
        self.index.insert(node.clone(), self.next_index);
        self.lowlink.insert(node.clone(), self.next_index);
        self.next_index += 1;
        self.stack.push(node.clone());
        self.on_stack.insert(node.clone());

        let neighbors: Vec<TaskId> = self
            .graph
            .get(node)
            .map(|deps| deps.iter().map(|d| (*d).clone()).collect())
            .unwrap_or_default();

        for neighbor in neighbors {
            if !self.index.contains_key(&neighbor) {
                self.strong_connect(&neighbor);
                let low = self.lowlink[&neighbor].min(self.lowlink[node]);
                self.lowlink.insert(node.clone(), low);
            } else if self.on_stack.contains(&neighbor) {
                let low = self.index[&neighbor].min(self.lowlink[node]);
                self.lowlink.insert(node.clone(), low);
            }
        }

        if self.lowlink[node] == self.index[node] {
            let mut component = Vec::new();
            while let Some(top) = self.stack.pop() {
                self.on_stack.remove(&top);
                let done = top == *node;
                component.push(top);
                if done {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
