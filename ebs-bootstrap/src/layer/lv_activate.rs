// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::action::Action;
use crate::backend::LvmBackend;
use crate::config::Config;
use crate::layer::{Layer, LayerError};
use crate::model::LvmState;
use std::cell::RefCell;
use std::rc::Rc;

/// Activates inactive logical volumes so `/dev/<vg>/<lv>` exists for the
/// filesystem layers downstream. Activation itself is verified by those
/// layers the moment they probe the device node, so this layer's own
/// validation has nothing left to check.
pub struct ActivateLogicalVolumeLayer {
    lvm_backend: Rc<RefCell<dyn LvmBackend>>,
}

impl ActivateLogicalVolumeLayer {
    pub fn new(lvm_backend: Rc<RefCell<dyn LvmBackend>>) -> Self {
        Self { lvm_backend }
    }
}

impl Layer for ActivateLogicalVolumeLayer {
    fn refresh(&self, config: &Config) -> Result<(), LayerError> {
        Ok(self.lvm_backend.borrow_mut().refresh(config)?)
    }

    fn plan(&self, config: &Config) -> Result<Vec<Action>, LayerError> {
        let backend = self.lvm_backend.borrow();
        let mut actions = Vec::new();
        for (name, spec) in &config.devices {
            let Some(lvm) = &spec.lvm else {
                continue;
            };

            let volume = backend.get_logical_volume(lvm, lvm)?;
            match volume.state {
                LvmState::LogicalVolumeActive => continue,
                LvmState::LogicalVolumeUnsupported => {
                    return Err(LayerError::LogicalVolumeUnsupported {
                        name: volume.name.clone(),
                    });
                }
                _ => {}
            }

            let action = backend
                .activate_logical_volume(lvm, lvm)
                .with_mode(config.mode(name));
            actions.push(action);
        }
        Ok(actions)
    }

    fn validate(&self, _config: &Config) -> Result<(), LayerError> {
        Ok(())
    }

    fn warning(&self) -> Option<&'static str> {
        None
    }

    fn should_process(&self, config: &Config) -> bool {
        config.devices.values().any(|spec| spec.lvm.is_some())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::action::ActionKind;
    use crate::backend::MockLvmBackend;
    use crate::model::LogicalVolume;

    fn layer(state: LvmState) -> ActivateLogicalVolumeLayer {
        let mut backend = MockLvmBackend::new();
        backend.expect_get_logical_volume().returning(move |name, vg| {
            Ok(LogicalVolume {
                name: name.to_string(),
                volume_group: vg.to_string(),
                state,
                size: 855638016,
            })
        });
        backend.expect_activate_logical_volume().returning(|name, vg| {
            Action::new(ActionKind::ActivateLogicalVolume {
                name: name.to_string(),
                volume_group: vg.to_string(),
            })
        });
        ActivateLogicalVolumeLayer::new(Rc::new(RefCell::new(backend)))
    }

    fn config() -> Config {
        Config::parse(
            "devices:\n  /dev/xvdf:\n    fs: ext4\n    lvm: data\n",
        )
        .unwrap()
    }

    #[test]
    fn test_inactive_volume_is_activated() {
        let actions = layer(LvmState::LogicalVolumeInactive)
            .plan(&config())
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(
            actions[0].kind(),
            &ActionKind::ActivateLogicalVolume {
                name: "data".to_string(),
                volume_group: "data".to_string(),
            }
        );
    }

    #[test]
    fn test_active_volume_is_skipped() {
        let actions =
            layer(LvmState::LogicalVolumeActive).plan(&config()).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_unsupported_state_is_refused() {
        let err = layer(LvmState::LogicalVolumeUnsupported)
            .plan(&config())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "data: Can not activate a logical volume in an unsupported state"
        );
    }
}
