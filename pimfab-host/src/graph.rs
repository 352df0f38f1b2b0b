// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! An in-memory [`Host`] that records the component graph.
//!
//! The [`ComponentGraph`] keeps every component, parameter and link it is
//! given so that the finished graph can be handed to the simulation engine,
//! printed, or compared against another build.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use pimfab_model_builder::EntityGet;
use pimfab_track::entity::{Entity, toplevel};
use pimfab_track::{Tracker, connect, debug};

use crate::host::{ComponentHandle, Host, LinkHandle, PortRef, StatisticsConfig};
use crate::param::Params;
use crate::sim_error;
use crate::types::{SimError, SimResult};

/// Everything the graph knows about one component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentRecord {
    /// Full name, subcomponents are named `parent.slot`.
    pub name: String,
    pub kind: String,
    /// Parent handle and slot name for subcomponents.
    pub parent: Option<(ComponentHandle, String)>,
    pub params: Params,
    pub slots: BTreeMap<String, ComponentHandle>,
}

/// A named link and, once connected, its two ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkRecord {
    pub name: String,
    pub ends: Option<(PortRef, PortRef)>,
}

/// A comparable copy of the structure of a graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub components: Vec<ComponentRecord>,
    pub links: Vec<LinkRecord>,
    pub statistics: Option<StatisticsConfig>,
}

#[derive(Default)]
struct GraphState {
    components: Vec<ComponentRecord>,
    entities: Vec<Rc<Entity>>,
    idx_by_name: HashMap<String, ComponentHandle>,
    links: Vec<LinkRecord>,
    link_idx_by_name: HashMap<String, LinkHandle>,
    bound_ports: HashMap<(ComponentHandle, String), LinkHandle>,
    statistics: Option<StatisticsConfig>,
    finalized: bool,
}

impl GraphState {
    fn check_not_finalized(&self, what: &str) -> SimResult {
        if self.finalized {
            return sim_error!("Graph already finalized, cannot {what}");
        }
        Ok(())
    }

    fn record(&self, handle: ComponentHandle) -> Result<&ComponentRecord, SimError> {
        match self.components.get(handle.0) {
            Some(record) => Ok(record),
            None => sim_error!("Unknown component {handle}"),
        }
    }

    fn add_component(
        &mut self,
        parent_entity: &Rc<Entity>,
        record: ComponentRecord,
        entity_name: &str,
    ) -> ComponentHandle {
        let handle = ComponentHandle(self.components.len());
        let entity = Rc::new(Entity::new(parent_entity, entity_name));
        debug!(entity ; "created {} ({})", record.name, record.kind);
        self.idx_by_name.insert(record.name.clone(), handle);
        self.components.push(record);
        self.entities.push(entity);
        handle
    }
}

/// A [`Host`] that records the graph in memory.
#[derive(EntityGet)]
pub struct ComponentGraph {
    entity: Rc<Entity>,
    state: RefCell<GraphState>,
}

impl ComponentGraph {
    /// Create an empty graph with its own top-level entity.
    #[must_use]
    pub fn new(tracker: &Tracker) -> Self {
        let top = toplevel(tracker, "top");
        Self::new_under(&top)
    }

    /// Create an empty graph whose entities live under `parent`.
    #[must_use]
    pub fn new_under(parent: &Rc<Entity>) -> Self {
        Self {
            entity: Rc::new(Entity::new(parent, "graph")),
            state: RefCell::new(GraphState::default()),
        }
    }

    /// The top-level entity which builders should use as their parent.
    #[must_use]
    pub fn top(&self) -> &Rc<Entity> {
        match &self.entity.parent {
            Some(parent) => parent,
            None => &self.entity,
        }
    }

    #[must_use]
    pub fn num_components(&self) -> usize {
        self.state.borrow().components.len()
    }

    #[must_use]
    pub fn num_links(&self) -> usize {
        self.state.borrow().links.len()
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state.borrow().finalized
    }

    /// Look up a component by its full name.
    #[must_use]
    pub fn find_component(&self, name: &str) -> Option<ComponentHandle> {
        self.state.borrow().idx_by_name.get(name).copied()
    }

    pub fn component(&self, handle: ComponentHandle) -> Result<ComponentRecord, SimError> {
        self.state.borrow().record(handle).cloned()
    }

    /// Parameters of a component looked up by its full name.
    #[must_use]
    pub fn params_of(&self, name: &str) -> Option<Params> {
        let state = self.state.borrow();
        let handle = state.idx_by_name.get(name)?;
        state.components.get(handle.0).map(|c| c.params.clone())
    }

    #[must_use]
    pub fn link(&self, name: &str) -> Option<LinkRecord> {
        let state = self.state.borrow();
        let handle = state.link_idx_by_name.get(name)?;
        state.links.get(handle.0).cloned()
    }

    /// Name of the link bound to a port, if any.
    #[must_use]
    pub fn link_bound_to(&self, component: ComponentHandle, port: &str) -> Option<String> {
        let state = self.state.borrow();
        let link = state.bound_ports.get(&(component, port.to_string()))?;
        state.links.get(link.0).map(|l| l.name.clone())
    }

    #[must_use]
    pub fn num_bound_ports(&self) -> usize {
        self.state.borrow().bound_ports.len()
    }

    #[must_use]
    pub fn statistics(&self) -> Option<StatisticsConfig> {
        self.state.borrow().statistics.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.state.borrow();
        GraphSnapshot {
            components: state.components.clone(),
            links: state.links.clone(),
            statistics: state.statistics.clone(),
        }
    }

    fn describe_port(state: &GraphState, port: &PortRef) -> String {
        match state.components.get(port.component.0) {
            Some(record) => format!("{}.{}", record.name, port.port),
            None => format!("{}.{}", port.component, port.port),
        }
    }
}

impl Host for ComponentGraph {
    fn create_component(
        &self,
        kind: &str,
        instance_name: &str,
    ) -> Result<ComponentHandle, SimError> {
        let mut state = self.state.borrow_mut();
        state.check_not_finalized("create components")?;
        if kind.is_empty() || instance_name.is_empty() {
            return sim_error!("Component requires a kind and a name ('{instance_name}': '{kind}')");
        }
        if state.idx_by_name.contains_key(instance_name) {
            return sim_error!("Duplicate component name '{instance_name}'");
        }

        let record = ComponentRecord {
            name: instance_name.to_string(),
            kind: kind.to_string(),
            parent: None,
            params: Params::new(),
            slots: BTreeMap::new(),
        };
        Ok(state.add_component(&self.entity, record, instance_name))
    }

    fn attach_subcomponent(
        &self,
        parent: ComponentHandle,
        slot_name: &str,
        kind: &str,
    ) -> Result<ComponentHandle, SimError> {
        let mut state = self.state.borrow_mut();
        state.check_not_finalized("attach subcomponents")?;
        if kind.is_empty() || slot_name.is_empty() {
            return sim_error!("Subcomponent requires a kind and a slot ('{slot_name}': '{kind}')");
        }

        let parent_record = state.record(parent)?;
        if parent_record.slots.contains_key(slot_name) {
            return sim_error!("Slot '{slot_name}' of '{}' already filled", parent_record.name);
        }

        let name = format!("{}.{}", parent_record.name, slot_name);
        let record = ComponentRecord {
            name,
            kind: kind.to_string(),
            parent: Some((parent, slot_name.to_string())),
            params: Params::new(),
            slots: BTreeMap::new(),
        };
        let parent_entity = state.entities[parent.0].clone();
        let handle = state.add_component(&parent_entity, record, slot_name);
        state.components[parent.0]
            .slots
            .insert(slot_name.to_string(), handle);
        Ok(handle)
    }

    fn set_parameters(&self, handle: ComponentHandle, params: &Params) -> SimResult {
        let mut state = self.state.borrow_mut();
        state.check_not_finalized("set parameters")?;
        state.record(handle)?;
        let entity = state.entities[handle.0].clone();
        for (key, value) in params {
            debug!(entity ; "{key} = {value}");
        }
        state.components[handle.0]
            .params
            .extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn create_link(&self, name: &str) -> Result<LinkHandle, SimError> {
        let mut state = self.state.borrow_mut();
        state.check_not_finalized("create links")?;
        if state.link_idx_by_name.contains_key(name) {
            return sim_error!("Duplicate link name '{name}'");
        }
        let handle = LinkHandle(state.links.len());
        state.links.push(LinkRecord {
            name: name.to_string(),
            ends: None,
        });
        state.link_idx_by_name.insert(name.to_string(), handle);
        Ok(handle)
    }

    fn connect(&self, link: LinkHandle, a: PortRef, b: PortRef) -> SimResult {
        let mut state = self.state.borrow_mut();
        state.check_not_finalized("connect links")?;
        let link_name = match state.links.get(link.0) {
            Some(record) if record.ends.is_some() => {
                return sim_error!("Link '{}' already connected", record.name);
            }
            Some(record) => record.name.clone(),
            None => return sim_error!("Unknown link {}", link.0),
        };

        state.record(a.component)?;
        state.record(b.component)?;
        if a.component == b.component && a.port == b.port {
            return sim_error!(
                "Link '{link_name}' connects {} to itself",
                Self::describe_port(&state, &a)
            );
        }
        for end in [&a, &b] {
            if let Some(other) = state.bound_ports.get(&(end.component, end.port.clone())) {
                return sim_error!(
                    "Port {} already bound by link '{}'",
                    Self::describe_port(&state, end),
                    state.links[other.0].name
                );
            }
        }

        debug!(self.entity ; "{link_name}: {} ({}) <-> {} ({})",
            Self::describe_port(&state, &a), a.latency,
            Self::describe_port(&state, &b), b.latency);
        connect!(state.entities[a.component.0] ; state.entities[b.component.0]);

        state.bound_ports.insert((a.component, a.port.clone()), link);
        state.bound_ports.insert((b.component, b.port.clone()), link);
        state.links[link.0].ends = Some((a, b));
        Ok(())
    }

    fn configure_statistics(&self, config: StatisticsConfig) -> SimResult {
        let mut state = self.state.borrow_mut();
        state.check_not_finalized("configure statistics")?;
        state.statistics = Some(config);
        Ok(())
    }

    fn finalize(&self) -> SimResult {
        let mut state = self.state.borrow_mut();
        state.check_not_finalized("finalize twice")?;
        if let Some(link) = state.links.iter().find(|l| l.ends.is_none()) {
            return sim_error!("Link '{}' was never connected", link.name);
        }
        state.finalized = true;
        debug!(self.entity ; "finalized with {} components and {} links",
            state.components.len(), state.links.len());
        Ok(())
    }

    fn component_name(&self, handle: ComponentHandle) -> Result<String, SimError> {
        Ok(self.state.borrow().record(handle)?.name.clone())
    }
}

impl fmt::Display for ComponentGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        writeln!(f, "Components:")?;
        for component in &state.components {
            writeln!(f, "  {} ({})", component.name, component.kind)?;
            for (key, value) in &component.params {
                writeln!(f, "    {key} = {value}")?;
            }
        }

        writeln!(f, "\nLinks:")?;
        for link in &state.links {
            match &link.ends {
                Some((a, b)) => writeln!(
                    f,
                    "  {}: {} ({}) <-> {} ({})",
                    link.name,
                    Self::describe_port(&state, a),
                    a.latency,
                    Self::describe_port(&state, b),
                    b.latency
                )?,
                None => writeln!(f, "  {}: unconnected", link.name)?,
            }
        }

        if let Some(stats) = &state.statistics {
            writeln!(
                f,
                "\nStatistics: level {} to {}",
                stats.load_level, stats.output
            )?;
        }
        Ok(())
    }
}
