use crate::action::Action;
use crate::execute::ExecuteConfig;
use crate::package::BuildArguments;
use crate::phase::{PhaseList, PhaseListError};
use crate::util::shell;

fn make(target: Option<&str>, arguments: &BuildArguments, config: &ExecuteConfig, parallel: bool) -> Action {
  let mut words = vec!["make".to_string()];
  if parallel && arguments.parallel_build {
    words.push(format!("-j{}", config.jobs.max(1)));
  }
  words.extend(target.map(str::to_string));
  words.extend(arguments.make_flags.iter().cloned());
  Action::shell(shell::join(&words))
}

pub(super) fn default_phases(arguments: &BuildArguments, config: &ExecuteConfig) -> Result<PhaseList, PhaseListError> {
  let mut configure = vec!["./configure".to_string(), "--prefix=$${out}".to_string()];
  configure.extend(arguments.configure_flags.iter().cloned());

  let check = if arguments.tests {
    make(Some("check"), arguments, config, true)
  } else {
    Action::Noop
  };

  PhaseList::from_phases([
    ("unpack", Action::Unpack),
    ("configure", Action::shell(shell::join(&configure))),
    ("build", make(None, arguments, config, true)),
    ("check", check),
    ("install", make(Some("install"), arguments, config, false)),
  ])
}
