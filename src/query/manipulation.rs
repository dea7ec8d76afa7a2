//! Insertion, moving, wrapping and property access.
//!
//! Content given to the inserting methods is cloned into every target, so
//! one specification may be applied to a whole selection. The `*_to` and
//! `insert_*` family move the selection instead: its members are cloned
//! into each target and the originals removed afterwards.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::loader::xml::{is_name_char, is_name_start_char};
use crate::nodes::{Builder, Content, Modifier, Nodes};
use crate::tree::NodeId;

impl Nodes {
    /// Resolves `content` (once, or per target for a callback) and applies
    /// `mutate` to every member.
    fn apply<F>(&self, content: &Content, mutate: F) -> Result<Self>
    where
        F: Fn(&Modifier<'_>, &[NodeId]) -> Vec<NodeId>,
    {
        if self.is_empty() {
            return Ok(self.spawn());
        }
        let builder = Builder::new(self);
        let shared = if content.is_callback() {
            None
        } else {
            Some(builder.get_content_nodes(content, true, None)?)
        };
        let mut touched = Vec::new();
        for (index, &target) in self.ids().iter().enumerate() {
            let computed;
            let nodes = match &shared {
                Some(nodes) => nodes,
                None => {
                    computed = builder.get_content_nodes_for(content, target, index, true, None)?;
                    &computed
                }
            };
            touched.extend(mutate(&Modifier::new(self.document(), target), nodes));
        }
        Ok(self.spawn_from(touched, false))
    }

    /// Clones the members into every target, then removes the originals.
    /// Nothing is removed when there are no targets.
    fn move_into<F>(&self, targets: Content, mutate: F) -> Result<Self>
    where
        F: Fn(&Modifier<'_>, &[NodeId]) -> Vec<NodeId>,
    {
        let targets = Builder::new(self).get_target_nodes(&targets, None)?;
        let originals = self.ids().to_vec();
        let mut inserted = Vec::new();
        for &target in &targets {
            inserted.extend(mutate(&Modifier::new(self.document(), target), &originals));
        }
        if !targets.is_empty() {
            let mut doc = self.document().borrow_mut();
            for &original in &originals {
                doc.detach(original);
            }
        }
        trace!(
            targets = targets.len(),
            moved = originals.len(),
            "selection moved"
        );
        Ok(self.spawn_from(inserted, false))
    }

    // --- Inserting content ---

    /// Appends content to every member and selects the inserted nodes.
    ///
    /// On an empty selection of a document without a document element,
    /// the first element of the content becomes the document element.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_content_nodes`].
    ///
    /// ```
    /// use fluentxml::Nodes;
    ///
    /// let doc = Nodes::load("<list/>", "text/xml").unwrap();
    /// let list = doc.find("/list").unwrap();
    /// list.append("<item>one</item>").unwrap();
    /// list.append(String::from("<item>two</item>")).unwrap();
    /// assert_eq!(doc.find("//item").unwrap().len(), 2);
    /// ```
    pub fn append(&self, content: impl Into<Content>) -> Result<Self> {
        let content = content.into();
        if self.is_empty() && self.document().borrow().root_element().is_none() {
            let element = Builder::new(self).get_content_element(&content)?;
            {
                let mut doc = self.document().borrow_mut();
                let root = doc.root();
                doc.append_child(root, element);
            }
            debug!("content installed as document element");
            return Ok(self.spawn_from(vec![element], false));
        }
        self.apply(&content, |modifier, nodes| {
            modifier.append_children(nodes)
        })
    }

    /// Inserts content before the first child of every member.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_content_nodes`].
    pub fn prepend(&self, content: impl Into<Content>) -> Result<Self> {
        self.apply(&content.into(), |modifier, nodes| {
            modifier.insert_children_before(nodes)
        })
    }

    /// Inserts content after every member.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_content_nodes`].
    pub fn after(&self, content: impl Into<Content>) -> Result<Self> {
        self.apply(&content.into(), |modifier, nodes| {
            modifier.insert_nodes_after(nodes)
        })
    }

    /// Inserts content before every member.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_content_nodes`].
    pub fn before(&self, content: impl Into<Content>) -> Result<Self> {
        self.apply(&content.into(), |modifier, nodes| {
            modifier.insert_nodes_before(nodes)
        })
    }

    /// Replaces every member with content and selects the removed members.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_content_nodes`].
    pub fn replace_with(&self, content: impl Into<Content>) -> Result<Self> {
        self.apply(&content.into(), |modifier, nodes| {
            modifier.replace_node(nodes).into_iter().collect()
        })
    }

    // --- Moving the selection ---

    /// Moves the members to the end of every target's children.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_target_nodes`].
    pub fn append_to(&self, targets: impl Into<Content>) -> Result<Self> {
        self.move_into(targets.into(), |modifier, nodes| {
            modifier.append_children(nodes)
        })
    }

    /// Moves the members to the start of every target's children.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_target_nodes`].
    pub fn prepend_to(&self, targets: impl Into<Content>) -> Result<Self> {
        self.move_into(targets.into(), |modifier, nodes| {
            modifier.insert_children_before(nodes)
        })
    }

    /// Moves the members after every target.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_target_nodes`].
    pub fn insert_after(&self, targets: impl Into<Content>) -> Result<Self> {
        self.move_into(targets.into(), |modifier, nodes| {
            modifier.insert_nodes_after(nodes)
        })
    }

    /// Moves the members before every target.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_target_nodes`].
    pub fn insert_before(&self, targets: impl Into<Content>) -> Result<Self> {
        self.move_into(targets.into(), |modifier, nodes| {
            modifier.insert_nodes_before(nodes)
        })
    }

    /// Replaces every target with the members.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_target_nodes`].
    pub fn replace_all(&self, targets: impl Into<Content>) -> Result<Self> {
        self.move_into(targets.into(), |modifier, nodes| {
            let inserted = modifier.insert_nodes_before(nodes);
            if !inserted.is_empty() {
                modifier.replace_node(&[]);
            }
            inserted
        })
    }

    // --- Wrapping ---

    /// Wraps every member in a clone of the template and selects the
    /// wrappers.
    ///
    /// The member goes into the first element of the template without
    /// element children. A callback template is invoked per member.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_content_element`].
    pub fn wrap(&self, template: impl Into<Content>) -> Result<Self> {
        let template = template.into();
        let builder = Builder::new(self);
        let fixed = if template.is_callback() || self.is_empty() {
            None
        } else {
            Some(builder.get_content_element(&template)?)
        };
        let mut simple = false;
        let mut wrappers = Vec::new();
        for (index, &node) in self.ids().iter().enumerate() {
            let mut own_simple = false;
            let (template_id, flag) = match fixed {
                Some(id) => (id, &mut simple),
                None => (
                    builder.get_content_element_for(&template, node, index)?,
                    &mut own_simple,
                ),
            };
            let (target, wrapper) = builder.get_wrapper_nodes(template_id, flag);
            let mut doc = self.document().borrow_mut();
            doc.insert_before(node, wrapper);
            doc.append_child(target, node);
            wrappers.push(wrapper);
        }
        Ok(self.spawn_from(wrappers, false))
    }

    /// Wraps the members in one clone of the template per parent. The
    /// wrapper takes the place of the group's first member.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_content_element`]; a callback template is
    /// [`Error::InvalidArgument`].
    pub fn wrap_all(&self, template: impl Into<Content>) -> Result<Self> {
        if self.is_empty() {
            return Ok(self.spawn());
        }
        let builder = Builder::new(self);
        let template = builder.get_content_element(&template.into())?;

        let mut groups: Vec<(Option<NodeId>, Vec<NodeId>)> = Vec::new();
        {
            let doc = self.document().borrow();
            for &id in self.ids() {
                let parent = doc.parent(id);
                match groups.iter_mut().find(|(p, _)| *p == parent) {
                    Some((_, members)) => members.push(id),
                    None => groups.push((parent, vec![id])),
                }
            }
        }

        let mut simple = false;
        let mut wrappers = Vec::new();
        for (_, members) in groups {
            let (target, wrapper) = builder.get_wrapper_nodes(template, &mut simple);
            let mut doc = self.document().borrow_mut();
            doc.insert_before(members[0], wrapper);
            for member in members {
                doc.append_child(target, member);
            }
            wrappers.push(wrapper);
        }
        Ok(self.spawn_from(wrappers, false))
    }

    /// Wraps the children of every member in a clone of the template.
    ///
    /// # Errors
    ///
    /// As [`Nodes::wrap`].
    pub fn wrap_inner(&self, template: impl Into<Content>) -> Result<Self> {
        let template = template.into();
        let builder = Builder::new(self);
        let fixed = if template.is_callback() || self.is_empty() {
            None
        } else {
            Some(builder.get_content_element(&template)?)
        };
        let mut simple = false;
        let mut wrappers = Vec::new();
        for (index, &node) in self.ids().iter().enumerate() {
            if !self.document().borrow().is_element(node) {
                continue;
            }
            let mut own_simple = false;
            let (template_id, flag) = match fixed {
                Some(id) => (id, &mut simple),
                None => (
                    builder.get_content_element_for(&template, node, index)?,
                    &mut own_simple,
                ),
            };
            let (target, wrapper) = builder.get_wrapper_nodes(template_id, flag);
            let mut doc = self.document().borrow_mut();
            let children: Vec<NodeId> = doc.children(node).collect();
            for child in children {
                doc.append_child(target, child);
            }
            doc.append_child(node, wrapper);
            wrappers.push(wrapper);
        }
        Ok(self.spawn_from(wrappers, false))
    }

    // --- Removing and copying ---

    /// Detaches the members matching `filter` (all without one) and selects
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the filter is malformed.
    pub fn remove(&self, filter: Option<&str>) -> Result<Self> {
        let mut removed = Vec::new();
        for &id in self.ids() {
            if let Some(filter) = filter {
                if !self.matches(filter, id)? {
                    continue;
                }
            }
            removed.push(id);
        }
        {
            let mut doc = self.document().borrow_mut();
            for &id in &removed {
                doc.detach(id);
            }
        }
        Ok(self.spawn_from(removed, false))
    }

    /// Removes the children of every member; text nodes are emptied.
    pub fn empty(&self) -> &Self {
        let mut doc = self.document().borrow_mut();
        for &id in self.ids() {
            if doc.is_element(id) {
                doc.remove_children(id);
            } else {
                doc.set_node_text(id, "");
            }
        }
        drop(doc);
        self
    }

    /// Deep copies of the members, detached from the tree.
    #[must_use]
    pub fn clone_nodes(&self) -> Self {
        let copies = {
            let mut doc = self.document().borrow_mut();
            self.ids()
                .iter()
                .map(|&id| doc.clone_node(id, true))
                .collect()
        };
        self.spawn_from(copies, false)
    }

    // --- Properties ---

    /// The concatenated text content of the members.
    #[must_use]
    pub fn text(&self) -> String {
        let doc = self.document().borrow();
        self.ids().iter().map(|&id| doc.text_content(id)).collect()
    }

    /// Replaces the content of every member with `text`.
    pub fn set_text(&self, text: &str) -> &Self {
        let mut doc = self.document().borrow_mut();
        for &id in self.ids() {
            if doc.is_element(id) {
                doc.remove_children(id);
                if !text.is_empty() {
                    let node = doc.create_text(text);
                    doc.append_child(id, node);
                }
            } else {
                doc.set_node_text(id, text);
            }
        }
        drop(doc);
        self
    }

    /// The inner markup of the first member.
    #[must_use]
    pub fn xml(&self) -> String {
        self.ids()
            .first()
            .map(|&id| Builder::new(self).get_inner_xml(id))
            .unwrap_or_default()
    }

    /// Replaces the children of every member with parsed markup. Empty
    /// markup clears them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFragmentLoader`] if no loader handles the
    /// configured content type.
    pub fn set_xml(&self, markup: &str) -> Result<&Self> {
        let builder = Builder::new(self);
        let content_type = &self.config().content_type;
        let nodes = builder.get_fragment(markup, content_type, true, None)?;
        for &id in self.ids() {
            Modifier::new(self.document(), id).replace_children(&nodes);
        }
        Ok(self)
    }

    /// The value of attribute `name` on the first element member.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<String> {
        let doc = self.document().borrow();
        let &first = self.ids().iter().find(|&&id| doc.is_element(id))?;
        doc.attribute(first, name).map(str::to_string)
    }

    /// Sets attribute `name` on every element member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `name` is not an XML name.
    pub fn set_attr(&self, name: &str, value: &str) -> Result<&Self> {
        if !is_xml_name(name) {
            return Err(Error::InvalidArgument(format!(
                "`{name}` is not a valid attribute name"
            )));
        }
        let mut doc = self.document().borrow_mut();
        for &id in self.ids() {
            doc.set_attribute(id, name, value);
        }
        drop(doc);
        Ok(self)
    }

    /// Removes attribute `name` from every element member.
    pub fn remove_attr(&self, name: &str) -> &Self {
        let mut doc = self.document().borrow_mut();
        for &id in self.ids() {
            doc.remove_attribute(id, name);
        }
        drop(doc);
        self
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char)
}
