//! One-shot plugin bootstrap with per-plugin failure isolation.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, error, info};

use crate::Dispatch;
use crate::error::{DispatchError, Result};
use crate::plugin::{self, Registrations};

/// What happened while bootstrapping a [`Dispatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
	/// Plugins that completed, in run order.
	pub loaded: Vec<String>,
	/// One [`DispatchError::PluginLoad`] per plugin that failed or panicked.
	pub failures: Vec<DispatchError>,
}

impl BootstrapReport {
	pub fn is_clean(&self) -> bool {
		self.failures.is_empty()
	}

	/// Whether `name` ran to completion.
	pub fn loaded(&self, name: &str) -> bool {
		self.loaded.iter().any(|n| n == name)
	}

	/// Whether `name` failed.
	pub fn failed(&self, name: &str) -> bool {
		self.failures
			.iter()
			.any(|e| matches!(e, DispatchError::PluginLoad { plugin, .. } if plugin == name))
	}
}

thread_local! {
	/// Addresses of the instances this thread is bootstrapping.
	static RUNNING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

fn address(dispatch: &Dispatch) -> usize {
	core::ptr::from_ref(dispatch) as usize
}

/// Whether the current thread is inside [`run`] for `dispatch`.
pub(crate) fn is_running(dispatch: &Dispatch) -> bool {
	let addr = address(dispatch);
	RUNNING.with(|running| running.borrow().contains(&addr))
}

/// Marks `dispatch` as bootstrapping on this thread until dropped, unwinding included.
struct RunningGuard(usize);

impl RunningGuard {
	fn enter(dispatch: &Dispatch) -> Self {
		let addr = address(dispatch);
		RUNNING.with(|running| running.borrow_mut().push(addr));
		Self(addr)
	}
}

impl Drop for RunningGuard {
	fn drop(&mut self) {
		RUNNING.with(|running| {
			let mut running = running.borrow_mut();
			if let Some(pos) = running.iter().rposition(|&a| a == self.0) {
				running.remove(pos);
			}
		});
	}
}

/// Runs injected registrars, then linked plugins if discovery is on.
pub(crate) fn run(dispatch: &Dispatch) -> BootstrapReport {
	let _running = RunningGuard::enter(dispatch);
	let registrations = Registrations::new(dispatch);
	let mut report = BootstrapReport::default();

	for registrar in &dispatch.registrars {
		run_one(&mut report, registrar.name(), || registrar.register(&registrations));
	}

	if dispatch.discover {
		for def in plugin::discovered() {
			debug!(plugin = def.meta.id, source = %def.meta.source, "running plugin");
			run_one(&mut report, def.meta.id, || (def.register)(&registrations));
		}
	}

	info!(
		loaded = report.loaded.len(),
		failed = report.failures.len(),
		"capability dispatch bootstrapped"
	);
	report
}

fn run_one(report: &mut BootstrapReport, name: &str, register: impl FnOnce() -> Result<()>) {
	let reason = match catch_unwind(AssertUnwindSafe(register)) {
		Ok(Ok(())) => {
			report.loaded.push(name.to_owned());
			return;
		}
		Ok(Err(err)) => err.to_string(),
		Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
	};

	error!(plugin = name, %reason, "plugin failed to load");
	report.failures.push(DispatchError::PluginLoad {
		plugin: name.to_owned(),
		reason,
	});
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
	if let Some(s) = payload.downcast_ref::<&'static str>() {
		s
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s
	} else {
		"unknown panic payload"
	}
}
