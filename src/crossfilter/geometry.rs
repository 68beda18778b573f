//! Planar hit tests for embedding selections

pub type Point = (f64, f64);

/// Absolute area by the shoelace formula
pub fn polygon_area(vertices: &[Point]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let twice: f64 = vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(&(x0, y0), &(x1, y1))| x0 * y1 - x1 * y0)
        .sum();
    (twice / 2.0).abs()
}

/// Axis-aligned box, bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// Box spanning two corners given in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        Rect {
            min: (a.0.min(b.0), a.1.min(b.1)),
            max: (a.0.max(b.0), a.1.max(b.1)),
        }
    }

    /// Bounding box of a non-empty point set
    pub fn bounding(points: &[Point]) -> Option<Self> {
        let (&first, rest) = points.split_first()?;
        Some(rest.iter().fold(Rect::from_corners(first, first), |rect, &(x, y)| Rect {
            min: (rect.min.0.min(x), rect.min.1.min(y)),
            max: (rect.max.0.max(x), rect.max.1.max(y)),
        }))
    }

    pub fn contains(&self, (x, y): Point) -> bool {
        x >= self.min.0 && x <= self.max.0 && y >= self.min.1 && y <= self.max.1
    }
}

/// Simple polygon with a cached bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point>,
    bounds: Rect,
}

impl Polygon {
    /// None for fewer than 3 vertices, non-finite vertices, or an area below `epsilon`
    pub fn new(vertices: Vec<Point>, epsilon: f64) -> Option<Self> {
        if vertices.len() < 3 || vertices.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return None;
        }
        if polygon_area(&vertices) < epsilon {
            return None;
        }
        let bounds = Rect::bounding(&vertices)?;
        Some(Polygon { vertices, bounds })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Even-odd ray casting; points exactly on an edge may fall either way
    pub fn contains(&self, point: Point) -> bool {
        if !self.bounds.contains(point) {
            return false;
        }
        let (x, y) = point;
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}
