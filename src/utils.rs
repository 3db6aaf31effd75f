use crate::error::GridParseError;
use crate::grid::{Grid, Pos};
use crate::palette::Palette;

/// Parses an array of string slices into a `Grid`.
///
/// Each string slice is one row, starting from the top (row 0). Layouts are
/// square: the number of rows sets the grid size and every row must have
/// exactly that many cells. Cells are palette letters (`R`, `B`, `G`, `Y`,
/// `P`, `O` for the reference palette, case-insensitive) or `.` for an empty
/// cell. Leading and trailing whitespace of a row is ignored.
///
/// # Arguments
/// * `rows`: the rows of the layout, top to bottom.
/// * `palette`: the palette the letters are resolved against.
///
/// # Returns
/// * `Ok(Grid)` if every row parses.
/// * `Err(GridParseError)` if there are no rows, a row has the wrong length,
///   or a character is neither `.` nor a letter of `palette`.
///
/// # Examples
/// ```
/// use match3_engine::grid::Pos;
/// use match3_engine::palette::{Color, Palette};
/// use match3_engine::utils::grid_from_str_array;
///
/// let palette = Palette::default();
/// let grid = grid_from_str_array(&["RGB", "Y.P", "OOR"], &palette).unwrap();
/// assert_eq!(grid.size(), 3);
/// assert_eq!(grid.get(Pos::new(0, 0)), Some(Color(0)));
/// assert_eq!(grid.get(Pos::new(1, 1)), None);
///
/// assert!(grid_from_str_array(&["RGX", "YBP", "OOR"], &palette).is_err());
/// assert!(grid_from_str_array(&["RG", "YBP"], &palette).is_err());
/// ```
pub fn grid_from_str_array(rows: &[&str], palette: &Palette) -> Result<Grid, GridParseError> {
    if rows.is_empty() {
        return Err(GridParseError::Empty);
    }
    let size = rows.len();

    let mut grid = Grid::new_empty(size);
    for (r, row_str) in rows.iter().enumerate() {
        let row_str = row_str.trim();
        let found = row_str.chars().count();
        if found != size {
            return Err(GridParseError::RowLength {
                row: r,
                expected: size,
                found,
            });
        }

        for (c, ch) in row_str.chars().enumerate() {
            let cell = match ch {
                '.' => None,
                _ => Some(palette.color_for_letter(ch).ok_or(
                    GridParseError::UnknownLetter {
                        ch,
                        row: r,
                        col: c,
                    },
                )?),
            };
            grid.set(Pos::new(r, c), cell);
        }
    }
    Ok(grid)
}

/// Parses a layout held in one string, one row per non-blank line.
pub fn grid_from_text(text: &str, palette: &Palette) -> Result<Grid, GridParseError> {
    let rows: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    grid_from_str_array(&rows, palette)
}

/// Formats a grid as rows of palette letters, the inverse of
/// `grid_from_str_array`.
pub fn grid_to_strings(grid: &Grid, palette: &Palette) -> Vec<String> {
    (0..grid.size())
        .map(|row| {
            (0..grid.size())
                .map(|col| match grid.get(Pos::new(row, col)) {
                    Some(color) => palette.letter(color),
                    None => '.',
                })
                .collect()
        })
        .collect()
}
