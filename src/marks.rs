//! Favorite and shopping-cart marks a user keeps on a recipe.
//!
//! Both marks live on one `favorite_carts` row per (user, recipe). The row is
//! modelled here as a four-state [`RecipeMark`] and every change goes through
//! [`RecipeMark::apply`], so the "delete the row once nothing is marked" rule
//! is the `None` outcome of a single transition table.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecipeMark {
    None,
    FavoritedOnly,
    InCartOnly,
    Both,
}

/// Which of the two marks a toggle touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    Favorite,
    Cart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkAction {
    Add(MarkKind),
    Remove(MarkKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkRejection {
    /// The mark is already set.
    AlreadySet(MarkKind),
    /// The mark being removed was never set.
    NotSet(MarkKind),
}

impl MarkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkKind::Favorite => "favorite",
            MarkKind::Cart => "shopping_cart",
        }
    }
}

impl MarkAction {
    pub fn new(kind: MarkKind, add: bool) -> Self {
        if add {
            MarkAction::Add(kind)
        } else {
            MarkAction::Remove(kind)
        }
    }

    pub fn kind(&self) -> MarkKind {
        match *self {
            MarkAction::Add(kind) | MarkAction::Remove(kind) => kind,
        }
    }
}

impl MarkRejection {
    pub fn message(&self) -> &'static str {
        match self {
            MarkRejection::AlreadySet(MarkKind::Favorite) => "Recipe is already in favorites",
            MarkRejection::AlreadySet(MarkKind::Cart) => "Recipe is already in shopping cart",
            MarkRejection::NotSet(MarkKind::Favorite) => "Recipe is not in favorites",
            MarkRejection::NotSet(MarkKind::Cart) => "Recipe is not in shopping cart",
        }
    }
}

impl RecipeMark {
    pub fn from_flags(favorited: bool, in_cart: bool) -> Self {
        match (favorited, in_cart) {
            (false, false) => RecipeMark::None,
            (true, false) => RecipeMark::FavoritedOnly,
            (false, true) => RecipeMark::InCartOnly,
            (true, true) => RecipeMark::Both,
        }
    }

    /// `(favorited, in_cart)` as stored on the row.
    pub fn flags(&self) -> (bool, bool) {
        match self {
            RecipeMark::None => (false, false),
            RecipeMark::FavoritedOnly => (true, false),
            RecipeMark::InCartOnly => (false, true),
            RecipeMark::Both => (true, true),
        }
    }

    pub fn is_favorited(&self) -> bool {
        self.flags().0
    }

    pub fn is_in_cart(&self) -> bool {
        self.flags().1
    }

    pub fn apply(self, action: MarkAction) -> Result<RecipeMark, MarkRejection> {
        use MarkAction::{Add, Remove};
        use MarkKind::{Cart, Favorite};
        use RecipeMark::*;

        let next = match (self, action) {
            (None, Add(Favorite)) => FavoritedOnly,
            (InCartOnly, Add(Favorite)) => Both,
            (FavoritedOnly | Both, Add(Favorite)) => {
                return Err(MarkRejection::AlreadySet(Favorite));
            }

            (FavoritedOnly, Remove(Favorite)) => None,
            (Both, Remove(Favorite)) => InCartOnly,
            (None | InCartOnly, Remove(Favorite)) => return Err(MarkRejection::NotSet(Favorite)),

            (None, Add(Cart)) => InCartOnly,
            (FavoritedOnly, Add(Cart)) => Both,
            (InCartOnly | Both, Add(Cart)) => return Err(MarkRejection::AlreadySet(Cart)),

            (InCartOnly, Remove(Cart)) => None,
            (Both, Remove(Cart)) => FavoritedOnly,
            (None | FavoritedOnly, Remove(Cart)) => return Err(MarkRejection::NotSet(Cart)),
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use MarkKind::{Cart, Favorite};

    #[rstest]
    #[case(RecipeMark::None, MarkAction::Add(Favorite), Ok(RecipeMark::FavoritedOnly))]
    #[case(RecipeMark::None, MarkAction::Remove(Favorite), Err(MarkRejection::NotSet(Favorite)))]
    #[case(RecipeMark::None, MarkAction::Add(Cart), Ok(RecipeMark::InCartOnly))]
    #[case(RecipeMark::None, MarkAction::Remove(Cart), Err(MarkRejection::NotSet(Cart)))]
    #[case(RecipeMark::FavoritedOnly, MarkAction::Add(Favorite), Err(MarkRejection::AlreadySet(Favorite)))]
    #[case(RecipeMark::FavoritedOnly, MarkAction::Remove(Favorite), Ok(RecipeMark::None))]
    #[case(RecipeMark::FavoritedOnly, MarkAction::Add(Cart), Ok(RecipeMark::Both))]
    #[case(RecipeMark::FavoritedOnly, MarkAction::Remove(Cart), Err(MarkRejection::NotSet(Cart)))]
    #[case(RecipeMark::InCartOnly, MarkAction::Add(Favorite), Ok(RecipeMark::Both))]
    #[case(RecipeMark::InCartOnly, MarkAction::Remove(Favorite), Err(MarkRejection::NotSet(Favorite)))]
    #[case(RecipeMark::InCartOnly, MarkAction::Add(Cart), Err(MarkRejection::AlreadySet(Cart)))]
    #[case(RecipeMark::InCartOnly, MarkAction::Remove(Cart), Ok(RecipeMark::None))]
    #[case(RecipeMark::Both, MarkAction::Add(Favorite), Err(MarkRejection::AlreadySet(Favorite)))]
    #[case(RecipeMark::Both, MarkAction::Remove(Favorite), Ok(RecipeMark::InCartOnly))]
    #[case(RecipeMark::Both, MarkAction::Add(Cart), Err(MarkRejection::AlreadySet(Cart)))]
    #[case(RecipeMark::Both, MarkAction::Remove(Cart), Ok(RecipeMark::FavoritedOnly))]
    fn transition_table(
        #[case] from: RecipeMark,
        #[case] action: MarkAction,
        #[case] expected: Result<RecipeMark, MarkRejection>,
    ) {
        assert_eq!(from.apply(action), expected);
    }

    #[rstest]
    #[case(RecipeMark::None)]
    #[case(RecipeMark::FavoritedOnly)]
    #[case(RecipeMark::InCartOnly)]
    #[case(RecipeMark::Both)]
    fn flags_round_trip(#[case] mark: RecipeMark) {
        let (favorited, in_cart) = mark.flags();
        assert_eq!(RecipeMark::from_flags(favorited, in_cart), mark);
    }

    #[test]
    fn toggling_one_mark_never_touches_the_other() {
        for mark in [
            RecipeMark::None,
            RecipeMark::FavoritedOnly,
            RecipeMark::InCartOnly,
            RecipeMark::Both,
        ] {
            for kind in [Favorite, Cart] {
                for add in [true, false] {
                    if let Ok(next) = mark.apply(MarkAction::new(kind, add)) {
                        match kind {
                            Favorite => assert_eq!(next.is_in_cart(), mark.is_in_cart()),
                            Cart => assert_eq!(next.is_favorited(), mark.is_favorited()),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn favorite_then_cart_then_unfavorite_keeps_the_cart() {
        let mark = RecipeMark::None
            .apply(MarkAction::Add(Favorite))
            .and_then(|m| m.apply(MarkAction::Add(Cart)))
            .and_then(|m| m.apply(MarkAction::Remove(Favorite)))
            .unwrap();
        assert_eq!(mark, RecipeMark::InCartOnly);
        assert_eq!(mark.apply(MarkAction::Remove(Cart)), Ok(RecipeMark::None));
    }

    #[test]
    fn second_favorite_is_rejected_without_changing_state() {
        let mark = RecipeMark::None.apply(MarkAction::Add(Favorite)).unwrap();
        let again = mark.apply(MarkAction::Add(Favorite));
        assert_eq!(again, Err(MarkRejection::AlreadySet(Favorite)));
        assert_eq!(again.unwrap_err().message(), "Recipe is already in favorites");
        assert_eq!(mark, RecipeMark::FavoritedOnly);
    }
}
