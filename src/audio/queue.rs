use std::collections::VecDeque;

use crate::audio::track::{Track, TrackInfo};
use crate::error::{MusicError, MusicResult};

/// Cola FIFO estricta de tracks pendientes, con capacidad acotada.
///
/// Sin reordenación ni prioridades: el orden de reproducción es exactamente
/// el orden de encolado. La representación interna no se expone; los comandos
/// de estado solo ven el resultado de [`TrackQueue::preview`].
pub struct TrackQueue {
    items: VecDeque<Track>,
    max_size: usize,
}

impl TrackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Encola al final. Devuelve la posición (base 1) dentro de la cola.
    pub fn push(&mut self, track: Track) -> MusicResult<usize> {
        if self.items.len() >= self.max_size {
            return Err(MusicError::QueueFull(self.max_size));
        }

        self.items.push_back(track);
        Ok(self.items.len())
    }

    /// Saca el siguiente track en orden de llegada.
    pub fn pop(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[allow(dead_code)]
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Copia de los primeros `limit` pendientes más cuántos quedan sin listar.
    pub fn preview(&self, limit: usize) -> (Vec<TrackInfo>, usize) {
        let upcoming: Vec<TrackInfo> = self.items.iter().take(limit).map(Track::info).collect();
        let remaining = self.items.len().saturating_sub(upcoming.len());

        (upcoming, remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::all::UserId;
    use songbird::input::YoutubeDl;

    fn track(title: &str) -> Track {
        let url = format!("https://www.youtube.com/watch?v={title}");
        let source = YoutubeDl::new(reqwest::Client::new(), url.clone());
        Track::new(title.to_string(), None, url, source, UserId::new(1))
    }

    #[test]
    fn respeta_el_orden_fifo() {
        let mut queue = TrackQueue::new(10);
        for title in ["uno", "dos", "tres"] {
            queue.push(track(title)).unwrap();
        }

        assert_eq!(queue.pop().unwrap().title(), "uno");
        assert_eq!(queue.pop().unwrap().title(), "dos");
        assert_eq!(queue.pop().unwrap().title(), "tres");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn push_devuelve_la_posicion_base_uno() {
        let mut queue = TrackQueue::new(10);
        assert_eq!(queue.push(track("uno")).unwrap(), 1);
        assert_eq!(queue.push(track("dos")).unwrap(), 2);
    }

    #[test]
    fn rechaza_cuando_la_cola_esta_llena() {
        let mut queue = TrackQueue::new(2);
        queue.push(track("uno")).unwrap();
        queue.push(track("dos")).unwrap();

        match queue.push(track("tres")) {
            Err(MusicError::QueueFull(2)) => {}
            otro => panic!("esperaba QueueFull, recibí {otro:?}"),
        }
        // El rechazo no toca lo ya encolado
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn preview_limita_y_cuenta_el_resto() {
        let mut queue = TrackQueue::new(50);
        for i in 0..13 {
            queue.push(track(&format!("t{i}"))).unwrap();
        }

        let (upcoming, remaining) = queue.preview(10);
        assert_eq!(upcoming.len(), 10);
        assert_eq!(remaining, 3);
        assert_eq!(upcoming[0].title, "t0");
        assert_eq!(upcoming[9].title, "t9");

        let (upcoming, remaining) = queue.preview(20);
        assert_eq!(upcoming.len(), 13);
        assert_eq!(remaining, 0);
    }
}
