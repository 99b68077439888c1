//! City map layout.
//!
//! A layout is a block of text, one row per line, one tile per character.
//! Rows are sent to the server top-down, exactly as written.
//!
//! Legend:
//! - `#` building
//! - `D` destination
//! - `^ > v <` road heading north/east/south/west
//! - `A` `B` `i` `d` signal on a road heading north/south/west/east
//! - anything else is empty ground

use thiserror::Error;

use crate::entity::Heading;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layout has no rows")]
    Empty,
    #[error("row {row} is {actual} tiles wide, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// One decoded tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Empty,
    Building,
    Destination,
    Road(Heading),
    Signal(Heading),
}

impl Tile {
    pub fn from_char(c: char) -> Self {
        match c {
            '#' => Tile::Building,
            'D' => Tile::Destination,
            '^' => Tile::Road(Heading::North),
            '>' => Tile::Road(Heading::East),
            'v' => Tile::Road(Heading::South),
            '<' => Tile::Road(Heading::West),
            'A' => Tile::Signal(Heading::North),
            'B' => Tile::Signal(Heading::South),
            'i' => Tile::Signal(Heading::West),
            'd' => Tile::Signal(Heading::East),
            _ => Tile::Empty,
        }
    }
}

/// A validated, rectangular map layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapLayout {
    rows: Vec<String>,
    width: usize,
}

impl MapLayout {
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, LayoutError> {
        let rows: Vec<String> = rows.iter().map(|r| r.as_ref().to_string()).collect();
        let width = rows.first().ok_or(LayoutError::Empty)?.chars().count();
        if width == 0 {
            return Err(LayoutError::Empty);
        }
        for (row, line) in rows.iter().enumerate() {
            let actual = line.chars().count();
            if actual != width {
                return Err(LayoutError::Ragged {
                    row,
                    expected: width,
                    actual,
                });
            }
        }
        Ok(Self { rows, width })
    }

    /// Parses a layout file body. Blank lines are ignored and trailing
    /// whitespace is trimmed.
    pub fn parse(text: &str) -> Result<Self, LayoutError> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        Self::from_rows(&rows)
    }

    /// The city used when no layout file is configured.
    pub fn builtin() -> Self {
        Self {
            rows: BUILTIN_LAYOUT.iter().map(|r| r.to_string()).collect(),
            width: BUILTIN_LAYOUT[0].len(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Number of tiles of each drawable kind: `(buildings, destinations, roads, signals)`.
    pub fn census(&self) -> (usize, usize, usize, usize) {
        let mut counts = (0, 0, 0, 0);
        for c in self.rows.iter().flat_map(|r| r.chars()) {
            match Tile::from_char(c) {
                Tile::Building => counts.0 += 1,
                Tile::Destination => counts.1 += 1,
                Tile::Road(_) => counts.2 += 1,
                Tile::Signal(_) => counts.3 += 1,
                Tile::Empty => {}
            }
        }
        counts
    }
}

const BUILTIN_LAYOUT: [&str; 30] = [
    "v<<<<<<<<<<<<<<<<i<<<<<<<<<<<<",
    "vv<<<<<<<<<<<<<<<i<<<<<<<<<<<^",
    "vv##^###^###vv#AA#####D#####^^",
    "vv##^#D#^###vv#^^<<<<<<<<<<<^^",
    "vv>>>>>>>>>>vv#^^<<<<<<<<<<<^^",
    "vv#Dv#v#^#v#vv#^^###########^^",
    "vv##v#v#^Dv#vv#^^>>>>>>>>>>>^^",
    "vv<<<<<<<<v<vv#^^>>>>>>>>>>>^^",
    "vv#Dv#D###v#vv#^^####vv##D##^^",
    "vv>>>>>>>>v>vv#^^D###vv#####^^",
    "vv##B##D##v#vv#^^####BB#####^^",
    "vv<<<i<<<<<<<<<<<<<<<<<i<<<<^^",
    "vv<<<i<<<<<<<<<<<<<<<<<i<<<<^^",
    "vv#########vv###^^##########^^",
    "vv########Dvv###^^##########^^",
    "vv#########vv###^^###D######^^",
    "vv>>>d>>>>>>>>>>>>>>>>>>>>>d^^",
    "vv>>>d>>>>>>>>>>>>>>>>>>>>>d^^",
    "vv#vv#AA####vv#^^####vv#####AA",
    "vv#vv#^^D###vv#^^###Dvv#####^^",
    "vv#vv#^^####vv#^^####vv#####^^",
    "vv#vv#^^#D##vv#^^####vv#####^^",
    "vv#vv#^^<<<<vv<^^<<<<vv<<<<<^^",
    "vv#vv#^^<<<<vv<^^<<<<vv<<<<<^^",
    "vv#vv#^^####vv#^^#D##vv#####^^",
    "vv#vv#^^D###vv#^^####vv#####^^",
    "vv#vv#^^####vv#^^####vv#####^^",
    "vv#vv#^^####BB#^^####BB##D##^^",
    "v>>>>>>>>>>d>>>>>>>>d>>>>>>>^^",
    ">>>>>>>>>>>d>>>>>>>>d>>>>>>>>^",
];
