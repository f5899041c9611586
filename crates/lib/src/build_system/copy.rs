use crate::action::Action;
use crate::action::actions::install::InstallEntry;
use crate::execute::ExecuteConfig;
use crate::package::BuildArguments;
use crate::phase::{PhaseList, PhaseListError};

/// Without a plan the whole source tree is copied into the output root.
pub(super) fn default_phases(arguments: &BuildArguments, _config: &ExecuteConfig) -> Result<PhaseList, PhaseListError> {
  let plan = arguments
    .install_plan
    .clone()
    .unwrap_or_else(|| vec![InstallEntry::new(".", "")]);

  PhaseList::from_phases([("unpack", Action::Unpack), ("install", Action::Install { plan })])
}
