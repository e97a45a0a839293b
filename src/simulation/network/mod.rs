use std::path::Path;

use nohash_hasher::IntMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::simulation::error::SimulationError;
use crate::simulation::id::Id;
use crate::simulation::io;

pub mod flow_cap;
pub mod link;
pub mod sim_network;
pub mod storage_cap;
pub mod stuck_timer;

/// Cell size used to derive how many vehicles fit onto a link. This mirrors
/// the default of 7.5 meters a standing passenger car occupies.
pub const DEFAULT_EFFECTIVE_CELL_SIZE: f32 = 7.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub x: f64,
    pub y: f64,
    pub id: Id<Node>,
    pub in_links: Vec<Id<Link>>,
    pub out_links: Vec<Id<Link>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: Id<Link>,
    pub from: Id<Node>,
    pub to: Id<Node>,
    pub length: f64,
    pub capacity: f32,
    pub freespeed: f32,
    pub permlanes: f32,
}

#[derive(Debug, Default, Clone)]
pub struct Network {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub effective_cell_size: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct IONetwork {
    nodes: Vec<IONode>,
    links: Vec<IOLink>,
    #[serde(default = "default_cell_size")]
    effective_cell_size: f32,
}

fn default_cell_size() -> f32 {
    DEFAULT_EFFECTIVE_CELL_SIZE
}

#[derive(Debug, Serialize, Deserialize)]
struct IONode {
    id: String,
    x: f64,
    y: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct IOLink {
    id: String,
    from: String,
    to: String,
    length: f64,
    capacity: f32,
    freespeed: f32,
    #[serde(default = "default_permlanes")]
    permlanes: f32,
}

fn default_permlanes() -> f32 {
    1.0
}

impl Node {
    pub fn new(id: Id<Node>, x: f64, y: f64) -> Self {
        Node {
            id,
            x,
            y,
            in_links: Vec::new(),
            out_links: Vec::new(),
        }
    }
}

impl Network {
    pub fn new() -> Self {
        Network {
            nodes: Vec::new(),
            links: Vec::new(),
            effective_cell_size: DEFAULT_EFFECTIVE_CELL_SIZE,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, SimulationError> {
        let io_net: IONetwork = io::from_yaml_file(path)?;
        let result = Self::from_io(io_net)?;
        info!(
            "Loaded network with {} nodes and {} links.",
            result.nodes.len(),
            result.links.len()
        );
        Ok(result)
    }

    fn from_io(io_net: IONetwork) -> Result<Self, SimulationError> {
        let mut result = Network {
            nodes: Vec::with_capacity(io_net.nodes.len()),
            links: Vec::with_capacity(io_net.links.len()),
            effective_cell_size: io_net.effective_cell_size,
        };

        for io_node in &io_net.nodes {
            let id = Id::<Node>::create(&io_node.id);
            result.add_node(Node::new(id, io_node.x, io_node.y));
        }

        for io_link in io_net.links {
            Self::check_positive(&io_link, "length", io_link.length)?;
            Self::check_positive(&io_link, "capacity", io_link.capacity as f64)?;
            Self::check_positive(&io_link, "freespeed", io_link.freespeed as f64)?;
            Self::check_positive(&io_link, "permlanes", io_link.permlanes as f64)?;

            let from = Self::resolve_node(&io_link, &io_link.from)?;
            let to = Self::resolve_node(&io_link, &io_link.to)?;
            let link = Link {
                id: Id::create(&io_link.id),
                from,
                to,
                length: io_link.length,
                capacity: io_link.capacity,
                freespeed: io_link.freespeed,
                permlanes: io_link.permlanes,
            };
            result.add_link(link);
        }

        Ok(result)
    }

    fn check_positive(io_link: &IOLink, attribute: &'static str, value: f64) -> Result<(), SimulationError> {
        if value <= 0.0 {
            return Err(SimulationError::InvalidLinkAttribute {
                link: io_link.id.clone(),
                attribute,
                value,
            });
        }
        Ok(())
    }

    fn resolve_node(io_link: &IOLink, node: &str) -> Result<Id<Node>, SimulationError> {
        Id::<Node>::try_get_from_ext(node).ok_or_else(|| SimulationError::UnknownNode {
            link: io_link.id.clone(),
            node: String::from(node),
        })
    }

    pub fn add_node(&mut self, node: Node) {
        assert_eq!(
            node.id.internal(),
            self.nodes.len() as u64,
            "nodes have to be inserted in order of their internal ids"
        );
        self.nodes.push(node);
    }

    pub fn add_link(&mut self, link: Link) {
        assert_eq!(
            link.id.internal(),
            self.links.len() as u64,
            "links have to be inserted in order of their internal ids"
        );
        self.nodes[link.from.internal() as usize]
            .out_links
            .push(link.id.clone());
        self.nodes[link.to.internal() as usize]
            .in_links
            .push(link.id.clone());
        self.links.push(link);
    }

    pub fn get_node(&self, id: &Id<Node>) -> &Node {
        &self.nodes[id.internal() as usize]
    }

    pub fn get_link(&self, id: &Id<Link>) -> &Link {
        &self.links[id.internal() as usize]
    }

    /// Downstream links reachable from the end node of the given link. Used to
    /// validate that routes follow the topology.
    pub fn out_links_of(&self, link_id: &Id<Link>) -> IntMap<Id<Link>, ()> {
        let link = self.get_link(link_id);
        self.get_node(&link.to)
            .out_links
            .iter()
            .map(|id| (id.clone(), ()))
            .collect()
    }
}
