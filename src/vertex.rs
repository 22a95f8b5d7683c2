//! Vertices and edges of polygonal bodies.
//!
//! Collision geometry identifies contact points by vertex and edge,
//! and asks the vertex for the curvature at that point.
//! Everything here is in body coordinates, relative to the center of mass.

use crate::{
    error::{Error, Result},
    math::Vec2,
};
use std::f64::consts::PI;

/// Index of an edge within the [`Polygon`][self::Polygon] that owns it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeIndex(pub usize);

/// An edge of a polygon, either a line segment or a circular arc.
#[derive(Clone, Copy, Debug)]
pub enum Edge {
    Straight {
        from: Vec2,
        to: Vec2,
    },
    Circular {
        from: Vec2,
        to: Vec2,
        center: Vec2,
        radius: f64,
        /// Convex arcs have their outside facing away from the center.
        outside_is_out: bool,
    },
}

impl Edge {
    /// Signed radius of curvature at the given point.
    /// Straight edges have infinite radius, concave arcs a negative one.
    pub fn curvature(&self, _p_body: Vec2) -> f64 {
        match *self {
            Edge::Straight { .. } => f64::INFINITY,
            Edge::Circular {
                radius,
                outside_is_out,
                ..
            } => {
                if outside_is_out {
                    radius
                } else {
                    -radius
                }
            }
        }
    }

    pub fn is_straight(&self) -> bool {
        matches!(self, Edge::Straight { .. })
    }

    /// Center of the circle for curved edges.
    pub fn center(&self) -> Option<Vec2> {
        match *self {
            Edge::Straight { .. } => None,
            Edge::Circular { center, .. } => Some(center),
        }
    }

    pub fn start(&self) -> Vec2 {
        match *self {
            Edge::Straight { from, .. } | Edge::Circular { from, .. } => from,
        }
    }

    pub fn end(&self) -> Vec2 {
        match *self {
            Edge::Straight { to, .. } | Edge::Circular { to, .. } => to,
        }
    }
}

/// Hands out vertex ids that are unique within one [`BodySet`][crate::BodySet].
/// Ids only exist to tell vertices apart when debugging.
#[derive(Clone, Debug)]
pub struct VertexIds {
    next: u64,
}

impl Default for VertexIds {
    fn default() -> Self {
        VertexIds { next: 1 }
    }
}

impl VertexIds {
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// A point on the boundary of a polygon.
///
/// End points sit where two edges meet. Mid points are placed along curved
/// edges so that collision checks can find them, and only belong to one edge.
#[derive(Clone, Debug)]
pub struct Vertex {
    id: u64,
    loc_body: Vec2,
    end_point: bool,
    /// The edge that ends at this vertex.
    edge1: Option<EdgeIndex>,
    /// The edge that starts at this vertex, `None` for mid points.
    edge2: Option<EdgeIndex>,
}

impl Vertex {
    pub fn new(id: u64, loc_body: Vec2, end_point: bool, edge: Option<EdgeIndex>) -> Self {
        Vertex {
            id,
            loc_body,
            end_point,
            edge1: edge,
            edge2: None,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn is_end_point(&self) -> bool {
        self.end_point
    }

    #[inline]
    pub fn loc_body(&self) -> Vec2 {
        self.loc_body
    }

    /// Radius of curvature at this vertex: the tighter of the two adjoining edges,
    /// or infinity if the vertex is not connected to anything.
    pub fn curvature(&self, edges: &[Edge]) -> f64 {
        let Some(e1) = self.edge1 else {
            return f64::INFINITY;
        };
        let mut r = edges[e1.0].curvature(self.loc_body);
        if let Some(e2) = self.edge2 {
            let r2 = edges[e2.0].curvature(self.loc_body);
            if r2.abs() < r.abs() {
                r = r2;
            }
        }
        r
    }

    pub fn edge1(&self) -> Result<EdgeIndex> {
        self.edge1.ok_or(Error::MissingEdge { vertex: self.id })
    }

    /// The next edge, or the previous one for mid points.
    pub fn edge2(&self) -> Result<EdgeIndex> {
        self.edge2
            .or(self.edge1)
            .ok_or(Error::MissingEdge { vertex: self.id })
    }

    #[inline]
    pub fn safe_edge2(&self) -> Option<EdgeIndex> {
        self.edge2
    }

    /// Edges can be attached to a vertex only once.
    pub fn set_edge1(&mut self, edge: EdgeIndex) -> Result<()> {
        if self.edge1.is_some() {
            return Err(Error::EdgeAlreadySet {
                vertex: self.id,
                slot: 1,
            });
        }
        self.edge1 = Some(edge);
        Ok(())
    }

    pub fn set_edge2(&mut self, edge: EdgeIndex) -> Result<()> {
        if self.edge2.is_some() {
            return Err(Error::EdgeAlreadySet {
                vertex: self.id,
                slot: 2,
            });
        }
        self.edge2 = Some(edge);
        Ok(())
    }
}

/// Geometry of a polygonal body: a closed loop of straight and circular edges.
#[derive(Clone, Debug)]
pub struct Polygon {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

impl Polygon {
    /// Shorthand for a closed polygon of straight edges through the given corners.
    pub fn from_corners(corners: &[Vec2], ids: &mut VertexIds) -> Result<Self> {
        let mut builder = PolygonBuilder::new(ids);
        let mut corners = corners.iter();
        if let Some(&first) = corners.next() {
            builder.start_path(first);
        }
        for &c in corners {
            builder.add_straight_edge(c)?;
        }
        builder.close_path()?;
        Ok(builder.build())
    }

    /// An axis-aligned rectangle centered on the origin.
    pub fn rectangle(width: f64, height: f64, ids: &mut VertexIds) -> Result<Self> {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Self::from_corners(
            &[
                Vec2::new(-hw, -hh),
                Vec2::new(hw, -hh),
                Vec2::new(hw, hh),
                Vec2::new(-hw, hh),
            ],
            ids,
        )
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, idx: EdgeIndex) -> &Edge {
        &self.edges[idx.0]
    }

    /// Area-weighted center of the vertex loop in body coordinates.
    pub fn centroid(&self) -> Vec2 {
        let (sum, den) = self.loop_sums(|a, b, cross| (a + b) * cross);
        if den == 0.0 {
            Vec2::zero()
        } else {
            sum / (3.0 * den)
        }
    }

    /// Moment of inertia per unit mass about the centroid,
    /// treating the vertex loop as a polygon.
    pub fn moment_of_inertia_coef(&self) -> f64 {
        let (num, den) = self.loop_sums(|a, b, cross| cross * (a.dot(a) + a.dot(b) + b.dot(b)));
        if den == 0.0 {
            return 0.0;
        }
        // parallel axis: the sum above is about the body origin
        let c = self.centroid();
        num / (6.0 * den) - c.dot(c)
    }

    /// Sum `f(a, b, cross(a, b))` over consecutive vertex pairs of the loop,
    /// along with the sum of the cross products (twice the signed area).
    fn loop_sums<T>(&self, f: impl Fn(Vec2, Vec2, f64) -> T) -> (T, f64)
    where
        T: Default + std::ops::AddAssign,
    {
        let pts: Vec<Vec2> = self.vertices.iter().map(|v| v.loc_body).collect();
        let n = pts.len();
        let mut acc = T::default();
        let mut den = 0.0;
        if n < 3 {
            return (acc, den);
        }
        for i in 0..n {
            let (a, b) = (pts[i], pts[(i + 1) % n]);
            let cross = a.x * b.y - b.x * a.y;
            acc += f(a, b, cross);
            den += cross;
        }
        (acc, den)
    }

    /// Distance from the origin to the farthest vertex.
    pub fn bounding_radius(&self) -> f64 {
        self.vertices
            .iter()
            .map(|v| v.loc_body.mag())
            .fold(0.0, f64::max)
    }
}

/// Builds a [`Polygon`][self::Polygon] one edge at a time,
/// wiring up the vertex/edge connections as it goes.
pub struct PolygonBuilder<'a> {
    ids: &'a mut VertexIds,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    path_start: Option<usize>,
    current: Option<usize>,
}

impl<'a> PolygonBuilder<'a> {
    /// Maximum angle spanned between two mid points of a curved edge.
    const MID_POINT_SPACING: f64 = PI / 8.0;

    pub fn new(ids: &'a mut VertexIds) -> Self {
        PolygonBuilder {
            ids,
            vertices: Vec::new(),
            edges: Vec::new(),
            path_start: None,
            current: None,
        }
    }

    pub fn start_path(&mut self, p: Vec2) -> &mut Self {
        let id = self.ids.next_id();
        self.vertices.push(Vertex::new(id, p, true, None));
        self.path_start = Some(self.vertices.len() - 1);
        self.current = self.path_start;
        self
    }

    fn current_loc(&self) -> Vec2 {
        self.current
            .map(|i| self.vertices[i].loc_body)
            .unwrap_or_else(Vec2::zero)
    }

    /// Connect the edge just pushed to the current vertex and to the vertex at `to`,
    /// reusing the path's first vertex if the edge returns to it.
    /// Mid points pushed before this call are not touched.
    fn finish_edge(&mut self, edge: EdgeIndex, to: Vec2) -> Result<()> {
        if let Some(cur) = self.current {
            self.vertices[cur].set_edge2(edge)?;
        }
        let closes = self
            .path_start
            .filter(|&s| (self.vertices[s].loc_body - to).mag() < 1e-12);
        match closes {
            Some(start) => {
                self.vertices[start].set_edge1(edge)?;
                self.current = None;
                self.path_start = None;
            }
            None => {
                let id = self.ids.next_id();
                self.vertices.push(Vertex::new(id, to, true, Some(edge)));
                self.current = Some(self.vertices.len() - 1);
            }
        }
        Ok(())
    }

    pub fn add_straight_edge(&mut self, to: Vec2) -> Result<&mut Self> {
        let from = self.current_loc();
        self.edges.push(Edge::Straight { from, to });
        let edge = EdgeIndex(self.edges.len() - 1);
        self.finish_edge(edge, to)?;
        Ok(self)
    }

    /// Add a circular arc ending at `to`, going around `center`.
    pub fn add_circular_edge(
        &mut self,
        to: Vec2,
        center: Vec2,
        clockwise: bool,
        outside_is_out: bool,
    ) -> Result<&mut Self> {
        let from = self.current_loc();
        let radius = (from - center).mag();
        self.edges.push(Edge::Circular {
            from,
            to,
            center,
            radius,
            outside_is_out,
        });
        let edge = EdgeIndex(self.edges.len() - 1);

        let a0 = (from.y - center.y).atan2(from.x - center.x);
        let a1 = (to.y - center.y).atan2(to.x - center.x);
        let mut sweep = a1 - a0;
        if clockwise {
            while sweep >= 0.0 {
                sweep -= 2.0 * PI;
            }
        } else {
            while sweep <= 0.0 {
                sweep += 2.0 * PI;
            }
        }
        let segments = (sweep.abs() / Self::MID_POINT_SPACING - 1e-9).ceil().max(1.0) as usize;
        for k in 1..segments {
            let a = a0 + sweep * k as f64 / segments as f64;
            let p = center + radius * Vec2::new(a.cos(), a.sin());
            let id = self.ids.next_id();
            self.vertices.push(Vertex::new(id, p, false, Some(edge)));
        }

        self.finish_edge(edge, to)?;
        Ok(self)
    }

    /// Connect the current vertex back to the start of the path with a straight edge,
    /// unless the last edge already did so.
    pub fn close_path(&mut self) -> Result<&mut Self> {
        if let Some(start) = self.path_start {
            let to = self.vertices[start].loc_body;
            self.add_straight_edge(to)?;
        }
        Ok(self)
    }

    pub fn build(self) -> Polygon {
        Polygon {
            vertices: self.vertices,
            edges: self.edges,
        }
    }
}
