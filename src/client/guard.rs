use super::session::SessionState;

/// Top-level screen groups of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGroup {
    Onboarding,
    Auth,
    Main,
}

/// Where the user must be sent from `current`, if anywhere.
pub fn redirect_for(
    onboarding_complete: bool,
    session: &SessionState,
    current: RouteGroup,
) -> Option<RouteGroup> {
    let signed_in = match session {
        SessionState::Restoring => return None,
        SessionState::Unauthenticated => false,
        SessionState::Authenticated(_) => true,
    };

    if !onboarding_complete && current != RouteGroup::Onboarding {
        Some(RouteGroup::Onboarding)
    } else if onboarding_complete && !signed_in && current != RouteGroup::Auth {
        Some(RouteGroup::Auth)
    } else if signed_in && current != RouteGroup::Main {
        Some(RouteGroup::Main)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::dto::PublicUser;
    use crate::client::session::Session;
    use RouteGroup::*;

    fn signed_in() -> SessionState {
        SessionState::Authenticated(Session {
            token: "t".into(),
            user: PublicUser {
                id: uuid::Uuid::new_v4(),
                email: "a@x.com".into(),
                name: None,
            },
        })
    }

    #[test]
    fn redirect_table() {
        let out = SessionState::Unauthenticated;
        let cases = [
            (false, &out, Main, Some(Onboarding)),
            (false, &out, Auth, Some(Onboarding)),
            (false, &out, Onboarding, None),
            (true, &out, Main, Some(Auth)),
            (true, &out, Onboarding, Some(Auth)),
            (true, &out, Auth, None),
        ];
        for (onboarded, session, current, expected) in cases {
            assert_eq!(
                redirect_for(onboarded, session, current),
                expected,
                "onboarded={} current={:?}",
                onboarded,
                current
            );
        }

        let session = signed_in();
        assert_eq!(redirect_for(true, &session, Auth), Some(Main));
        assert_eq!(redirect_for(true, &session, Onboarding), Some(Main));
        assert_eq!(redirect_for(true, &session, Main), None);
        assert_eq!(redirect_for(false, &session, Onboarding), Some(Main));
        assert_eq!(redirect_for(false, &session, Main), Some(Onboarding));
    }

    #[test]
    fn no_redirect_while_restoring() {
        for current in [Onboarding, Auth, Main] {
            assert_eq!(redirect_for(false, &SessionState::Restoring, current), None);
            assert_eq!(redirect_for(true, &SessionState::Restoring, current), None);
        }
    }
}
