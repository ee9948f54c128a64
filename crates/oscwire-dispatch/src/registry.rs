use std::collections::HashMap;
use std::sync::Arc;

use oscwire_codec::Message;
use tracing::trace;

use crate::error::{DispatchError, Result};
use crate::subsystem::{PropertyInfo, Subsystem};

/// Collects subsystems at startup. [`build`](Self::build) freezes them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    subsystems: Vec<Arc<dyn Subsystem>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subsystem. Names must be unique.
    pub fn register(&mut self, subsystem: Arc<dyn Subsystem>) -> Result<&mut Self> {
        let name = subsystem.name();
        if self.subsystems.iter().any(|s| s.name() == name) {
            return Err(DispatchError::DuplicateSubsystem(name.to_string()));
        }
        self.subsystems.push(subsystem);
        Ok(self)
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, subsystem: impl Subsystem + 'static) -> Result<Self> {
        self.register(Arc::new(subsystem))?;
        Ok(self)
    }

    pub fn build(self) -> Registry {
        let order = self.subsystems.iter().map(|s| s.name().to_string()).collect();
        let subsystems = self
            .subsystems
            .into_iter()
            .map(|s| (s.name().to_string(), s))
            .collect();
        Registry { subsystems, order }
    }
}

/// Immutable address → subsystem table.
///
/// Safe to share across threads behind an `Arc`; lookups take no locks.
pub struct Registry {
    subsystems: HashMap<String, Arc<dyn Subsystem>>,
    order: Vec<String>,
}

/// A resolved address.
pub struct Route<'a> {
    pub subsystem: &'a dyn Subsystem,
    pub index: Option<usize>,
    pub property: &'a PropertyInfo,
}

impl std::fmt::Debug for Route<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("subsystem", &self.subsystem.name())
            .field("index", &self.index)
            .field("property", &self.property.name)
            .finish()
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Resolve `/<subsystem>[/<index>]/<property>`.
    pub fn resolve(&self, address: &str) -> Result<Route<'_>> {
        let mut segments = address.strip_prefix('/').unwrap_or(address).splitn(3, '/');

        let name = segments.next().unwrap_or_default();
        let subsystem = self
            .subsystems
            .get(name)
            .ok_or_else(|| DispatchError::UnknownSubsystem(name.to_string()))?;

        let index = match subsystem.instance_count() {
            Some(count) => {
                let raw = segments.next().unwrap_or_default();
                match parse_index(raw) {
                    Some(i) if i < count => Some(i),
                    _ => {
                        return Err(DispatchError::IndexOutOfRange {
                            subsystem: name.to_string(),
                            index: raw.to_string(),
                            count,
                        })
                    }
                }
            }
            None => None,
        };

        // Whatever is left is the property name; a trailing path never matches.
        let rest: Vec<&str> = segments.collect();
        let property_name = rest.join("/");
        if property_name.is_empty() {
            return Err(DispatchError::MissingProperty {
                subsystem: name.to_string(),
            });
        }
        let property = subsystem
            .properties()
            .iter()
            .find(|p| p.name == property_name)
            .ok_or_else(|| DispatchError::UnknownProperty {
                subsystem: name.to_string(),
                property: property_name.clone(),
            })?;

        Ok(Route {
            subsystem: subsystem.as_ref(),
            index,
            property,
        })
    }

    /// Route one message to its subsystem.
    ///
    /// A message without arguments reads the property and returns the reply
    /// (same address, one argument). A message with one argument writes it and
    /// returns `None`.
    pub fn dispatch(&self, msg: &Message) -> Result<Option<Message>> {
        let route = self.resolve(&msg.address)?;
        let prop = route.property;
        trace!(address = %msg.address, args = msg.args.len(), "dispatch");

        match msg.args.as_slice() {
            [] => {
                if !prop.access.readable() {
                    return Err(DispatchError::NotReadable(prop.name.to_string()));
                }
                let value = route.subsystem.get(route.index, prop.name)?;
                Ok(Some(Message::new(msg.address.clone()).with_arg(value)))
            }
            [arg] => {
                if !prop.access.writable() {
                    return Err(DispatchError::NotWritable(prop.name.to_string()));
                }
                let value = prop.value_type.coerce(prop.name, arg.clone())?;
                route.subsystem.set(route.index, prop.name, value)?;
                Ok(None)
            }
            args => Err(DispatchError::TooManyArguments(args.len())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Subsystem>> {
        self.subsystems.get(name)
    }

    /// Subsystems in registration order.
    pub fn subsystems(&self) -> impl Iterator<Item = &Arc<dyn Subsystem>> {
        self.order.iter().filter_map(|name| self.subsystems.get(name))
    }

    pub fn len(&self) -> usize {
        self.subsystems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subsystems.is_empty()
    }
}

/// An index segment is plain decimal digits; signs and whitespace never match.
fn parse_index(raw: &str) -> Option<usize> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use oscwire_codec::Argument;

    use super::*;
    use crate::subsystem::ValueType;

    const OUT_PROPS: &[PropertyInfo] = &[
        PropertyInfo::read_write("value", ValueType::Int),
        PropertyInfo::read_only("active", ValueType::Int),
        PropertyInfo::write_only("pulse", ValueType::Float),
    ];

    #[derive(Default)]
    struct RecordingOutputs {
        sets: Mutex<Vec<(Option<usize>, String, Argument)>>,
    }

    impl Subsystem for RecordingOutputs {
        fn name(&self) -> &str {
            "digitalout"
        }

        fn instance_count(&self) -> Option<usize> {
            Some(8)
        }

        fn properties(&self) -> &[PropertyInfo] {
            OUT_PROPS
        }

        fn get(&self, index: Option<usize>, _property: &str) -> Result<Argument> {
            Ok(Argument::Int(index.unwrap_or(0) as i32 * 10))
        }

        fn set(&self, index: Option<usize>, property: &str, value: Argument) -> Result<()> {
            self.sets
                .lock()
                .unwrap()
                .push((index, property.to_string(), value));
            Ok(())
        }
    }

    struct Flat;

    impl Subsystem for Flat {
        fn name(&self) -> &str {
            "system"
        }

        fn properties(&self) -> &[PropertyInfo] {
            const PROPS: &[PropertyInfo] = &[PropertyInfo::read_only("version", ValueType::String)];
            PROPS
        }

        fn get(&self, index: Option<usize>, _property: &str) -> Result<Argument> {
            assert!(index.is_none());
            Ok(Argument::String("1.0".into()))
        }

        fn set(&self, _index: Option<usize>, _property: &str, _value: Argument) -> Result<()> {
            unreachable!("read-only")
        }
    }

    fn registry() -> (Registry, Arc<RecordingOutputs>) {
        let outputs = Arc::new(RecordingOutputs::default());
        let mut builder = Registry::builder();
        builder.register(outputs.clone()).unwrap();
        builder.register(Arc::new(Flat)).unwrap();
        (builder.build(), outputs)
    }

    #[test]
    fn write_calls_setter_with_index_and_value() {
        let (reg, outputs) = registry();
        let reply = reg
            .dispatch(&Message::new("/digitalout/3/value").with_arg(1))
            .unwrap();
        assert!(reply.is_none());
        assert_eq!(
            outputs.sets.lock().unwrap().as_slice(),
            &[(Some(3), "value".to_string(), Argument::Int(1))]
        );
    }

    #[test]
    fn read_replies_on_same_address() {
        let (reg, _) = registry();
        let reply = reg
            .dispatch(&Message::new("/digitalout/4/value"))
            .unwrap()
            .unwrap();
        assert_eq!(reply.address, "/digitalout/4/value");
        assert_eq!(reply.args, vec![Argument::Int(40)]);
    }

    #[test]
    fn index_out_of_range() {
        let (reg, _) = registry();
        let err = reg
            .dispatch(&Message::new("/digitalout/9/value").with_arg(1))
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::IndexOutOfRange {
                subsystem: "digitalout".into(),
                index: "9".into(),
                count: 8
            }
        );
    }

    #[test]
    fn non_numeric_or_missing_index_is_out_of_range() {
        let (reg, _) = registry();
        assert!(matches!(
            reg.resolve("/digitalout/x/value"),
            Err(DispatchError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            reg.resolve("/digitalout"),
            Err(DispatchError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            reg.resolve("/digitalout/-1/value"),
            Err(DispatchError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn signed_index_is_rejected() {
        let (reg, outputs) = registry();
        match reg.dispatch(&Message::new("/digitalout/+3/value").with_arg(1)) {
            Err(DispatchError::IndexOutOfRange { index, .. }) => assert_eq!(index, "+3"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(outputs.sets.lock().unwrap().is_empty());
        assert!(matches!(
            reg.resolve("/digitalout/ 3/value"),
            Err(DispatchError::IndexOutOfRange { .. })
        ));
        assert_eq!(reg.resolve("/digitalout/03/value").unwrap().index, Some(3));
    }

    #[test]
    fn unknown_property() {
        let (reg, _) = registry();
        let err = reg.resolve("/digitalout/3/bogus").unwrap_err();
        assert_eq!(
            err,
            DispatchError::UnknownProperty {
                subsystem: "digitalout".into(),
                property: "bogus".into()
            }
        );
        assert!(matches!(
            reg.resolve("/digitalout/3/value/extra"),
            Err(DispatchError::UnknownProperty { .. })
        ));
        assert!(matches!(
            reg.resolve("/digitalout/3"),
            Err(DispatchError::MissingProperty { .. })
        ));
    }

    #[test]
    fn unknown_subsystem() {
        let (reg, _) = registry();
        assert_eq!(
            reg.resolve("/stepper/0/position").unwrap_err(),
            DispatchError::UnknownSubsystem("stepper".into())
        );
    }

    #[test]
    fn subsystem_without_index_skips_segment() {
        let (reg, _) = registry();
        let route = reg.resolve("/system/version").unwrap();
        assert_eq!(route.index, None);
        assert_eq!(route.property.name, "version");
        let reply = reg.dispatch(&Message::new("/system/version")).unwrap().unwrap();
        assert_eq!(reply.args[0].as_str(), Some("1.0"));
    }

    #[test]
    fn access_and_type_checks() {
        let (reg, outputs) = registry();
        assert_eq!(
            reg.dispatch(&Message::new("/digitalout/0/active").with_arg(1))
                .unwrap_err(),
            DispatchError::NotWritable("active".into())
        );
        assert_eq!(
            reg.dispatch(&Message::new("/digitalout/0/pulse")).unwrap_err(),
            DispatchError::NotReadable("pulse".into())
        );
        assert!(matches!(
            reg.dispatch(&Message::new("/digitalout/0/value").with_arg("on")),
            Err(DispatchError::TypeMismatch { found: 's', .. })
        ));
        assert_eq!(
            reg.dispatch(&Message::new("/digitalout/0/value").with_arg(1).with_arg(2))
                .unwrap_err(),
            DispatchError::TooManyArguments(2)
        );

        // Int promoted for a float property.
        reg.dispatch(&Message::new("/digitalout/1/pulse").with_arg(2))
            .unwrap();
        assert_eq!(
            outputs.sets.lock().unwrap().last().unwrap().2,
            Argument::Float(2.0)
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut builder = Registry::builder();
        builder.register(Arc::new(Flat)).unwrap();
        assert_eq!(
            builder.register(Arc::new(Flat)).err(),
            Some(DispatchError::DuplicateSubsystem("system".into()))
        );
    }

    #[test]
    fn iteration_keeps_registration_order() {
        let (reg, _) = registry();
        let names: Vec<_> = reg.subsystems().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["digitalout", "system"]);
        assert_eq!(reg.len(), 2);
        assert!(reg.get("system").is_some());
    }

    #[test]
    fn error_reply_uses_request_address() {
        let (reg, _) = registry();
        let err = reg.resolve("/digitalout/9/value").unwrap_err();
        let reply = err.to_reply("/digitalout/9/value");
        assert_eq!(reply.address, "/digitalout/9/value");
        assert!(reply.args[0].as_str().unwrap().starts_with("error: index '9'"));
    }
}
