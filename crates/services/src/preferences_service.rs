use storage::PersistenceStore;
use study_core::model::{Theme, UserProfile};

/// Theme and learner profile, both stored locally.
#[derive(Clone)]
pub struct PreferencesService {
    store: PersistenceStore,
}

impl PreferencesService {
    #[must_use]
    pub fn new(store: PersistenceStore) -> Self {
        Self { store }
    }

    pub async fn theme(&self) -> Theme {
        self.store.theme().await
    }

    /// Store `theme`; returns whether it was persisted.
    pub async fn set_theme(&self, theme: Theme) -> bool {
        self.store.save_theme(theme).await.is_ok()
    }

    /// Flip between light and dark and return the new theme.
    ///
    /// The new theme applies even if it could not be persisted.
    pub async fn toggle_theme(&self) -> Theme {
        let next = self.theme().await.toggled();
        self.set_theme(next).await;
        next
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.store.user().await
    }

    /// Store the learner's name; blank names are ignored.
    pub async fn set_user_name(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.store
            .save_user(&UserProfile {
                name: name.to_owned(),
            })
            .await
            .is_ok()
    }

    pub async fn display_name(&self) -> String {
        UserProfile::display_name(self.profile().await.as_ref()).to_owned()
    }
}
