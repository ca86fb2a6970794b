use std::collections::HashSet;
use std::rc::Rc;

/// Hash-consing pool for directory names and per-stage pathnames.
///
/// The tree writer relies on the invariant that two equal directory-name
/// strings obtained from the same interner are the same allocation, so frame
/// transitions can be detected with `Rc::ptr_eq` instead of a string compare.
/// Reference counting also keeps renamed-away path strings alive for as long
/// as any stage still points at them.
pub struct PathInterner {
    names: HashSet<Rc<str>>,
}

impl PathInterner {
    pub fn new() -> Self {
        PathInterner {
            names: HashSet::new(),
        }
    }

    pub fn intern(&mut self, s: &str) -> Rc<str> {
        if let Some(existing) = self.names.get(s) {
            return Rc::clone(existing);
        }
        let name: Rc<str> = Rc::from(s);
        self.names.insert(Rc::clone(&name));
        name
    }

    pub fn same(a: &Rc<str>, b: &Rc<str>) -> bool {
        Rc::ptr_eq(a, b)
    }
}

impl Default for PathInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_share_one_allocation() {
        let mut pool = PathInterner::new();
        let a = pool.intern("src/core");
        let b = pool.intern("src/core");
        assert!(PathInterner::same(&a, &b));
        assert_eq!(&*a, "src/core");
    }

    #[test]
    fn distinct_strings_do_not_alias() {
        let mut pool = PathInterner::new();
        let a = pool.intern("src");
        let b = pool.intern("lib");
        assert!(!PathInterner::same(&a, &b));
    }

    #[test]
    fn interned_name_survives_reinterning() {
        let mut pool = PathInterner::new();
        let first = pool.intern("d");
        for _ in 0..3 {
            let again = pool.intern("d");
            assert!(PathInterner::same(&first, &again));
        }
    }
}
