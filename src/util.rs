// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::path::Path;

/// Derives an effect name from its file: the file name without the extension. Returns a
/// fallback if the name is unreadable.
pub fn effect_name(path: &Path) -> &str {
    path.file_stem()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use crate::util::effect_name;

    #[test]
    fn test_effect_name() {
        assert_eq!("flash", effect_name(Path::new("data/lights/flash.lua")));
        assert_eq!("Kitt", effect_name(Path::new("Kitt.tengo")));
        assert_eq!("two.dots", effect_name(Path::new("/fx/two.dots.lua")));
    }
}
