//! Topology graph structure.

use std::collections::{HashMap, HashSet};

use super::types::{NodeId, StructureWarning};
use crate::elements::{Element, ElementKind};
use crate::error::{BudgetError, Result, StructureFault};

/// One element slot with its power-flow edges.
#[derive(Debug, Clone)]
struct Slot {
    element: Element,
    /// Upstream elements feeding this one (exactly one when valid)
    parents: Vec<NodeId>,
    /// Downstream elements sharing this element's output rail
    children: Vec<NodeId>,
}

/// A directed power-distribution graph.
///
/// Elements live in an arena indexed by [`NodeId`]; edges point from the
/// upstream (parent) element to the downstream (child) element. The graph
/// keeps explicit adjacency lists instead of element-owned links, so
/// structural validation is a plain graph check.
#[derive(Debug, Clone)]
pub struct TopologyGraph {
    name: String,
    slots: Vec<Option<Slot>>,
    names: HashMap<String, NodeId>,
}

impl TopologyGraph {
    /// Create an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Graph name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the graph has no elements.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Find an element id by name.
    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    fn require(&self, name: &str) -> Result<NodeId> {
        self.id(name).ok_or_else(|| BudgetError::unknown(name))
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Element by name.
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.id(name).and_then(|id| self.node(id))
    }

    /// Element by id.
    pub fn node(&self, id: NodeId) -> Option<&Element> {
        self.slot(id).map(|s| &s.element)
    }

    /// Name of the element at `id` (empty for a vacant id).
    pub fn name_of(&self, id: NodeId) -> &str {
        self.node(id).map(Element::name).unwrap_or("")
    }

    /// Live element ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| NodeId(i))
    }

    /// Upstream edges of an element.
    pub fn parents_of(&self, id: NodeId) -> &[NodeId] {
        self.slot(id).map(|s| s.parents.as_slice()).unwrap_or(&[])
    }

    /// Downstream edges of an element, in insertion order.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.slot(id).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    /// First parent of an element.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents_of(id).first().copied()
    }

    /// Source elements in insertion order.
    pub fn sources(&self) -> Vec<NodeId> {
        self.ids()
            .filter(|&id| self.node(id).map(Element::kind) == Some(ElementKind::Source))
            .collect()
    }

    fn insert(&mut self, element: Element, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.slots.len());
        self.names.insert(element.name().to_string(), id);
        self.slots.push(Some(Slot {
            element,
            parents: parent.into_iter().collect(),
            children: Vec::new(),
        }));
        if let Some(p) = parent {
            if let Some(slot) = self.slot_mut(p) {
                slot.children.push(id);
            }
        }
        id
    }

    /// Add a root source.
    pub fn add_source(&mut self, element: impl Into<Element>) -> Result<NodeId> {
        let element = element.into();
        if self.names.contains_key(element.name()) {
            return Err(BudgetError::DuplicateName {
                name: element.name().to_string(),
            });
        }
        if element.kind() != ElementKind::Source {
            return Err(BudgetError::structure(element.name(), StructureFault::Orphan));
        }
        log::trace!("{}: add source '{}'", self.name, element.name());
        Ok(self.insert(element, None))
    }

    /// Attach an element under a named parent.
    pub fn attach(&mut self, parent: &str, element: impl Into<Element>) -> Result<NodeId> {
        let element = element.into();
        let pid = self.require(parent)?;
        if self.names.contains_key(element.name()) {
            return Err(BudgetError::DuplicateName {
                name: element.name().to_string(),
            });
        }
        let accepts = self.node(pid).map(Element::accepts_children).unwrap_or(false);
        if element.kind() == ElementKind::Source || !accepts {
            return Err(BudgetError::InvalidChild {
                parent: parent.to_string(),
                child_kind: element.kind(),
            });
        }
        log::trace!("{}: attach '{}' under '{}'", self.name, element.name(), parent);
        Ok(self.insert(element, Some(pid)))
    }

    /// Add a raw power-flow edge between two existing elements.
    ///
    /// No structural rule is enforced here; [`validate`](Self::validate)
    /// reports any violation this creates.
    pub fn connect(&mut self, parent: &str, child: &str) -> Result<()> {
        let pid = self.require(parent)?;
        let cid = self.require(child)?;
        if self.children_of(pid).contains(&cid) {
            return Ok(());
        }
        if let Some(slot) = self.slot_mut(pid) {
            slot.children.push(cid);
        }
        if let Some(slot) = self.slot_mut(cid) {
            slot.parents.push(pid);
        }
        Ok(())
    }

    /// Remove a power-flow edge. Returns whether the edge existed.
    pub fn disconnect(&mut self, parent: &str, child: &str) -> Result<bool> {
        let pid = self.require(parent)?;
        let cid = self.require(child)?;
        if !self.children_of(pid).contains(&cid) {
            return Ok(false);
        }
        if let Some(slot) = self.slot_mut(pid) {
            slot.children.retain(|&c| c != cid);
        }
        if let Some(slot) = self.slot_mut(cid) {
            slot.parents.retain(|&p| p != pid);
        }
        Ok(true)
    }

    /// Replace an element in place, keeping its edges. Returns the old element.
    pub fn replace(&mut self, name: &str, element: impl Into<Element>) -> Result<Element> {
        let element = element.into();
        let id = self.require(name)?;
        if element.name() != name && self.names.contains_key(element.name()) {
            return Err(BudgetError::DuplicateName {
                name: element.name().to_string(),
            });
        }
        let old_kind = self.node(id).map(Element::kind);
        if let Some(pid) = self.parent_of(id) {
            if element.kind() == ElementKind::Source {
                return Err(BudgetError::InvalidChild {
                    parent: self.name_of(pid).to_string(),
                    child_kind: ElementKind::Source,
                });
            }
        } else if old_kind == Some(ElementKind::Source) && element.kind() != ElementKind::Source
        {
            return Err(BudgetError::structure(element.name(), StructureFault::Orphan));
        }
        if !element.accepts_children() {
            if let Some(&child) = self.children_of(id).first() {
                let child_kind = self
                    .node(child)
                    .map(Element::kind)
                    .unwrap_or(ElementKind::Load);
                return Err(BudgetError::InvalidChild {
                    parent: element.name().to_string(),
                    child_kind,
                });
            }
        }

        self.names.remove(name);
        self.names.insert(element.name().to_string(), id);
        let slot = self.slot_mut(id).ok_or_else(|| BudgetError::unknown(name))?;
        Ok(std::mem::replace(&mut slot.element, element))
    }

    /// Remove one element, re-attaching its children to its parent.
    ///
    /// A source with children cannot be removed this way.
    pub fn remove(&mut self, name: &str) -> Result<Element> {
        let id = self.require(name)?;
        let is_source = self.node(id).map(Element::kind) == Some(ElementKind::Source);
        if is_source && !self.children_of(id).is_empty() {
            return Err(BudgetError::structure(
                self.name_of(self.children_of(id)[0]),
                StructureFault::Orphan,
            ));
        }

        let parents = self.parents_of(id).to_vec();
        let children = self.children_of(id).to_vec();
        let new_parent = parents.first().copied();

        // Splice the children into the parent's list where the element was.
        let mut position = None;
        for &p in &parents {
            if let Some(slot) = self.slot_mut(p) {
                if let Some(pos) = slot.children.iter().position(|&c| c == id) {
                    slot.children.remove(pos);
                    if Some(p) == new_parent {
                        position = Some(pos);
                    }
                }
            }
        }
        for (offset, &c) in children.iter().enumerate() {
            if let Some(slot) = self.slot_mut(c) {
                slot.parents.retain(|&p| p != id);
            }
            if let Some(p) = new_parent {
                if self.children_of(p).contains(&c) {
                    continue;
                }
                if let Some(slot) = self.slot_mut(p) {
                    let at = position.map(|pos| pos + offset).unwrap_or(slot.children.len());
                    slot.children.insert(at.min(slot.children.len()), c);
                }
                if let Some(slot) = self.slot_mut(c) {
                    slot.parents.insert(0, p);
                }
            }
        }

        self.names.remove(name);
        let slot = self.slots[id.0].take().ok_or_else(|| BudgetError::unknown(name))?;
        log::trace!("{}: removed '{}'", self.name, name);
        Ok(slot.element)
    }

    /// Remove an element and everything downstream of it.
    ///
    /// Returns the removed elements in pre-order.
    pub fn remove_subtree(&mut self, name: &str) -> Result<Vec<Element>> {
        let root = self.require(name)?;
        let doomed = self.subtree(root);
        let members: HashSet<NodeId> = doomed.iter().copied().collect();

        for &id in &doomed {
            for p in self.parents_of(id).to_vec() {
                if members.contains(&p) {
                    continue;
                }
                if let Some(slot) = self.slot_mut(p) {
                    slot.children.retain(|&c| c != id);
                }
            }
        }

        let mut removed = Vec::with_capacity(doomed.len());
        for id in doomed {
            if let Some(slot) = self.slots[id.0].take() {
                self.names.remove(slot.element.name());
                removed.push(slot.element);
            }
        }
        log::trace!("{}: removed {} elements under '{}'", self.name, removed.len(), name);
        Ok(removed)
    }

    /// Name of the parent of an element.
    pub fn parent(&self, name: &str) -> Result<Option<&str>> {
        let id = self.require(name)?;
        Ok(self.parent_of(id).map(|p| self.name_of(p)))
    }

    /// Names of the direct children of an element.
    pub fn children(&self, name: &str) -> Result<Vec<&str>> {
        let id = self.require(name)?;
        Ok(self.children_of(id).iter().map(|&c| self.name_of(c)).collect())
    }

    /// Upstream chain of an element, nearest first.
    pub fn ancestors(&self, name: &str) -> Result<Vec<&str>> {
        let id = self.require(name)?;
        let mut seen = HashSet::from([id]);
        let mut chain = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(p) = current {
            if !seen.insert(p) {
                break;
            }
            chain.push(self.name_of(p));
            current = self.parent_of(p);
        }
        Ok(chain)
    }

    /// Everything downstream of an element, in pre-order.
    pub fn descendants(&self, name: &str) -> Result<Vec<&str>> {
        let id = self.require(name)?;
        Ok(self
            .subtree(id)
            .into_iter()
            .skip(1)
            .map(|d| self.name_of(d))
            .collect())
    }

    /// Source that powers an element (the element itself for a source).
    pub fn domain(&self, name: &str) -> Result<Option<&str>> {
        let id = self.require(name)?;
        if self.node(id).map(Element::kind) == Some(ElementKind::Source) {
            return Ok(Some(self.name_of(id)));
        }
        let root = self
            .ancestors(name)?
            .last()
            .copied()
            .filter(|n| self.element(n).map(Element::kind) == Some(ElementKind::Source));
        Ok(root)
    }

    /// Pre-order traversal from `root`, children in insertion order.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        self.walk_from(root, &mut seen, &mut order);
        order
    }

    fn walk_from(&self, root: NodeId, seen: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.slot(id).is_none() || !seen.insert(id) {
                continue;
            }
            order.push(id);
            stack.extend(self.children_of(id).iter().rev());
        }
    }

    /// Canonical element order: each source followed by its tree in pre-order.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut order = Vec::with_capacity(self.len());
        for source in self.sources() {
            self.walk_from(source, &mut seen, &mut order);
        }
        order
    }

    /// Every phase name referenced by an element, sorted.
    pub fn phases(&self) -> Vec<&str> {
        let mut phases: Vec<&str> = self
            .ids()
            .filter_map(|id| self.node(id))
            .flat_map(Element::phases)
            .collect();
        phases.sort_unstable();
        phases.dedup();
        phases
    }

    /// Check the structural rules of the graph.
    ///
    /// Returns non-fatal warnings, or the first structural error found.
    pub fn validate(&self) -> Result<Vec<StructureWarning>> {
        super::validate::validate_topology(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Converter, LinearRegulator, Load, Loss, Source};

    fn case() -> TopologyGraph {
        let mut g = TopologyGraph::new("case");
        g.add_source(Source::new("3V coin", 3.0).unwrap().with_resistance(13e-3))
            .unwrap();
        g.attach("3V coin", Converter::new("1.8V buck", 1.8, 0.87).unwrap())
            .unwrap();
        g.attach("1.8V buck", Load::power("MCU", 27e-3).unwrap()).unwrap();
        g.attach("3V coin", Converter::new("5V boost", 5.0, 0.91).unwrap())
            .unwrap();
        g.attach("5V boost", Load::current("Sensor", 15e-3).unwrap()).unwrap();
        g.attach("5V boost", Loss::resistive("RC filter", 33.0).unwrap())
            .unwrap();
        g.attach("RC filter", LinearRegulator::new("LDO 2.5V", 2.5, 0.27).unwrap())
            .unwrap();
        g.attach("LDO 2.5V", Load::power("ADC", 15e-3).unwrap()).unwrap();
        g
    }

    #[test]
    fn test_walk_is_preorder() {
        let g = case();
        let names: Vec<&str> = g.walk().into_iter().map(|id| g.name_of(id)).collect();
        assert_eq!(
            names,
            vec![
                "3V coin",
                "1.8V buck",
                "MCU",
                "5V boost",
                "Sensor",
                "RC filter",
                "LDO 2.5V",
                "ADC"
            ]
        );
    }

    #[test]
    fn test_attach_rules() {
        let mut g = case();
        assert!(matches!(
            g.attach("Nope", Load::current("X", 1.0).unwrap()),
            Err(BudgetError::UnknownElement { .. })
        ));
        assert!(matches!(
            g.attach("3V coin", Load::current("MCU", 1.0).unwrap()),
            Err(BudgetError::DuplicateName { .. })
        ));
        assert!(matches!(
            g.attach("3V coin", Source::new("5V", 5.0).unwrap()),
            Err(BudgetError::InvalidChild { .. })
        ));
        assert!(matches!(
            g.attach("MCU", Loss::resistive("Trace", 0.1).unwrap()),
            Err(BudgetError::InvalidChild { .. })
        ));
        assert!(g.add_source(Load::power("Stray", 1.0).unwrap()).is_err());
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let g = case();
        assert_eq!(
            g.ancestors("ADC").unwrap(),
            vec!["LDO 2.5V", "RC filter", "5V boost", "3V coin"]
        );
        assert_eq!(
            g.descendants("5V boost").unwrap(),
            vec!["Sensor", "RC filter", "LDO 2.5V", "ADC"]
        );
        assert_eq!(g.parent("MCU").unwrap(), Some("1.8V buck"));
        assert_eq!(g.parent("3V coin").unwrap(), None);
        assert_eq!(g.domain("ADC").unwrap(), Some("3V coin"));
        assert!(g.ancestors("ghost").is_err());
    }

    #[test]
    fn test_remove_splices_children() {
        let mut g = case();
        let removed = g.remove("RC filter").unwrap();
        assert_eq!(removed.name(), "RC filter");
        assert_eq!(g.parent("LDO 2.5V").unwrap(), Some("5V boost"));
        assert_eq!(g.children("5V boost").unwrap(), vec!["Sensor", "LDO 2.5V"]);
        assert!(g.validate().is_ok());
        assert!(g.remove("3V coin").is_err());
        assert!(g.remove("ghost").is_err());
    }

    #[test]
    fn test_remove_subtree() {
        let mut g = case();
        let removed = g.remove_subtree("5V boost").unwrap();
        assert_eq!(removed.len(), 5);
        assert_eq!(g.len(), 3);
        assert_eq!(g.children("3V coin").unwrap(), vec!["1.8V buck"]);
        assert!(g.id("ADC").is_none());

        // Ids of surviving elements are stable
        assert_eq!(g.id("MCU"), Some(NodeId(2)));
        g.attach("3V coin", Load::current("LED", 0.02).unwrap()).unwrap();
        assert_eq!(g.id("LED"), Some(NodeId(8)));
    }

    #[test]
    fn test_remove_source_subtree() {
        let mut g = case();
        g.add_source(Source::new("12V", 12.0).unwrap()).unwrap();
        g.attach("12V", Load::power("Motor", 6.0).unwrap()).unwrap();
        assert_eq!(g.remove_subtree("12V").unwrap().len(), 2);
        assert_eq!(g.sources().len(), 1);
    }

    #[test]
    fn test_replace() {
        let mut g = case();
        let old = g
            .replace("1.8V buck", LinearRegulator::new("LDO 1.8", 1.8, 0.2).unwrap())
            .unwrap();
        assert_eq!(old.name(), "1.8V buck");
        assert_eq!(g.parent("MCU").unwrap(), Some("LDO 1.8"));
        assert!(g.id("1.8V buck").is_none());

        assert!(g.replace("LDO 1.8", Source::new("5V", 5.0).unwrap()).is_err());
        assert!(g
            .replace("3V coin", LinearRegulator::new("LDO2", 3.3, 0.1).unwrap())
            .is_err());
        assert!(g.replace("LDO 1.8", Load::current("X", 0.1).unwrap()).is_err());
        assert!(g
            .replace("LDO 1.8", Converter::new("ADC", 1.8, 0.9).unwrap())
            .is_err());
    }

    #[test]
    fn test_phases_collected() {
        let mut g = TopologyGraph::new("phased");
        g.add_source(Source::new("5V", 5.0).unwrap()).unwrap();
        g.attach(
            "5V",
            Converter::new("Buck", 3.3, 0.9)
                .unwrap()
                .with_active_phases(["active"], 0.0),
        )
        .unwrap();
        g.attach(
            "Buck",
            Load::power("MCU", 0.2)
                .unwrap()
                .with_phase_demand("sleep", 1e-6)
                .unwrap()
                .with_phase_demand("active", 0.2)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(g.phases(), vec!["active", "sleep"]);
    }
}
