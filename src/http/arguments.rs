//! Positional argument lists for controller methods.

use super::{HttpError, Next, Request, Response};
use crate::decorators::{ParamBinding, ParamKind};

/// One value a handler parameter can receive.
#[derive(Debug)]
pub enum Argument {
    Request(Request),
    Response(Response),
    Next(Next),
}

/// Conversion from a bound [`Argument`] into a parameter type.
pub trait FromArgument: Sized {
    fn from_argument(argument: Argument) -> Option<Self>;
}

impl FromArgument for Request {
    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::Request(request) => Some(request),
            _ => None,
        }
    }
}

impl FromArgument for Response {
    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::Response(response) => Some(response),
            _ => None,
        }
    }
}

impl FromArgument for Next {
    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::Next(next) => Some(next),
            _ => None,
        }
    }
}

/// Arguments for one handler call, addressed by parameter index.
#[derive(Debug, Default)]
pub struct Arguments {
    slots: Vec<Option<Argument>>,
}

impl Arguments {
    /// Classic handler order: `(req, res, next)`.
    pub fn positional(request: Request, response: Response, next: Next) -> Self {
        Self {
            slots: vec![
                Some(Argument::Request(request)),
                Some(Argument::Response(response)),
                Some(Argument::Next(next)),
            ],
        }
    }

    /// Places each value at the index recorded by its binding.
    ///
    /// The continuation is single-use, so only the first `Next` binding receives it.
    pub fn bound(bindings: &[ParamBinding], request: Request, response: Response, next: Next) -> Self {
        let len = bindings.iter().map(|b| b.index + 1).max().unwrap_or(0);
        let mut slots: Vec<Option<Argument>> = (0..len).map(|_| None).collect();
        let mut next = Some(next);
        for binding in bindings {
            slots[binding.index] = match binding.kind {
                ParamKind::Request => Some(Argument::Request(request.clone())),
                ParamKind::Response => Some(Argument::Response(response.clone())),
                ParamKind::Next => next.take().map(Argument::Next),
            };
        }
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Moves the argument at `index` out, converted to `T`.
    pub fn take<T: FromArgument>(&mut self, index: usize) -> Result<T, HttpError> {
        let argument = self
            .slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| HttpError::internal(format!("no argument bound at position {index}")))?;
        T::from_argument(argument).ok_or_else(|| {
            HttpError::internal(format!(
                "argument at position {index} cannot be passed as {}",
                std::any::type_name::<T>()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method};

    fn request() -> Request {
        Request::new(Method::GET, "/users".parse().unwrap(), HeaderMap::new(), "")
    }

    #[test]
    fn bound_arguments_follow_recorded_indices() {
        // recorded in reverse order: the response binding was applied first
        let bindings = [
            ParamBinding { index: 1, kind: ParamKind::Response },
            ParamBinding { index: 0, kind: ParamKind::Request },
        ];
        let response = Response::new();
        let mut args = Arguments::bound(&bindings, request(), response.clone(), Next::end());

        assert_eq!(args.len(), 2);
        let req: Request = args.take(0).unwrap();
        assert_eq!(req.path(), "/users");
        let res: Response = args.take(1).unwrap();
        res.send("hi");
        assert!(response.headers_sent());
    }

    #[test]
    fn wrong_type_or_missing_slot_is_an_error() {
        let mut args = Arguments::positional(request(), Response::new(), Next::end());
        assert!(args.take::<Response>(0).is_err());
        assert!(args.take::<Response>(7).is_err());
        assert!(args.take::<Next>(2).is_ok());
        assert!(args.take::<Next>(2).is_err());
    }
}
